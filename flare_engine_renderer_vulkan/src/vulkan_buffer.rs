/// Buffer - Vulkan buffer with its memory allocation

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::{engine_bail, engine_err};

use crate::vulkan_context::GpuContext;

pub struct Buffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    pub(crate) size: u64,
}

impl Buffer {
    pub fn new(
        ctx: Arc<GpuContext>,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        name: &str,
    ) -> Result<Self> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size.max(1))
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&create_info, None)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to create {} buffer: {:?}", name, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let allocation = ctx.allocator.lock().allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            });

            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(GpuContext::out_of_memory(name, requirements.size, e));
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                ctx.allocator.lock().free(allocation).ok();
                ctx.device.destroy_buffer(buffer, None);
                engine_bail!("flare::vulkan", "Failed to bind {} buffer memory: {:?}", name, e);
            }

            Ok(Self { ctx, buffer, allocation: Some(allocation), size })
        }
    }

    /// Create a host-visible buffer filled with `data`
    pub fn with_data(
        ctx: Arc<GpuContext>,
        data: &[u8],
        usage: vk::BufferUsageFlags,
        name: &str,
    ) -> Result<Self> {
        let buffer = Self::new(ctx, data.len() as u64, usage, MemoryLocation::CpuToGpu, name)?;
        buffer.write(0, data)?;
        Ok(buffer)
    }

    /// Create a GPU-only buffer and fill it through a staging copy
    pub fn device_local(
        ctx: Arc<GpuContext>,
        data: &[u8],
        usage: vk::BufferUsageFlags,
        name: &str,
    ) -> Result<Self> {
        let staging = Self::with_data(Arc::clone(&ctx), data, vk::BufferUsageFlags::TRANSFER_SRC, "staging")?;
        let buffer = Self::new(
            Arc::clone(&ctx),
            data.len() as u64,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            name,
        )?;

        if !data.is_empty() {
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size: data.len() as u64 };
            ctx.one_shot(|cb| unsafe {
                ctx.device.cmd_copy_buffer(cb, staging.buffer, buffer.buffer, &[region]);
            })?;
        }

        Ok(buffer)
    }

    /// Copy `data` into the mapped memory at `offset`
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end > self.size {
            engine_bail!("flare::vulkan", InvalidResource:
                "Buffer write of {} bytes at {} overflows buffer of {} bytes", data.len(), offset, self.size);
        }

        let mapped = self.mapped_ptr()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
        }
        Ok(())
    }

    /// Copy `len` bytes out of the mapped memory
    pub fn read(&self, len: usize) -> Result<Vec<u8>> {
        if len as u64 > self.size {
            engine_bail!("flare::vulkan", InvalidResource:
                "Buffer read of {} bytes exceeds buffer of {} bytes", len, self.size);
        }

        let mapped = self.mapped_ptr()?;
        let mut out = vec![0u8; len];
        unsafe {
            std::ptr::copy_nonoverlapping(mapped, out.as_mut_ptr(), len);
        }
        Ok(out)
    }

    fn mapped_ptr(&self) -> Result<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.as_ptr() as *mut u8)
            .ok_or_else(|| engine_err!("flare::vulkan", "Buffer is not CPU-accessible"))
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                self.ctx.allocator.lock().free(allocation).ok();
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
