/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Every resource (buffers, images, pipelines, binding sets, command pools)
/// holds an `Arc<GpuContext>`; the device and instance are destroyed when the
/// last of them is dropped, so no resource can outlive the device.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use parking_lot::Mutex;
use std::mem::ManuallyDrop;
use flare_engine::flare::{Error, Result};
use flare_engine::{engine_err, engine_error};

pub struct GpuContext {
    /// Keeps the Vulkan loader alive for the lifetime of the instance
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    /// Dropped before the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    /// Serializes every `vkQueueSubmit` / `vkQueuePresentKHR`.
    /// Uploads may run on host threads while the frame is submitted.
    queue_lock: Mutex<()>,

    /// TRANSIENT + RESET_COMMAND_BUFFER pool for one-shot uploads
    upload_command_pool: Mutex<vk::CommandPool>,

    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        upload_command_pool: vk::CommandPool,
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    ) -> Self {
        Self {
            entry,
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_queue_family,
            queue_lock: Mutex::new(()),
            upload_command_pool: Mutex::new(upload_command_pool),
            debug_utils_loader,
            debug_messenger,
        }
    }

    /// Run `f` with exclusive access to the graphics queue
    pub fn with_queue<T>(&self, f: impl FnOnce(vk::Queue) -> T) -> T {
        let _guard = self.queue_lock.lock();
        f(self.graphics_queue)
    }

    /// Record commands into a temporary command buffer, submit them and
    /// block until they complete.
    pub fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let pool = self.upload_command_pool.lock();

        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = self.device.allocate_command_buffers(&alloc_info)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to allocate upload command buffer: {:?}", e))?
                [0];

            let result = self.submit_one_shot(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn submit_one_shot<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        self.device.begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| engine_err!("flare::vulkan", "Failed to begin upload command buffer: {:?}", e))?;

        record(command_buffer);

        self.device.end_command_buffer(command_buffer)
            .map_err(|e| engine_err!("flare::vulkan", "Failed to end upload command buffer: {:?}", e))?;

        let fence = self.device.create_fence(&vk::FenceCreateInfo::default(), None)
            .map_err(|e| engine_err!("flare::vulkan", "Failed to create upload fence: {:?}", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        let submitted = self.with_queue(|queue| {
            self.device.queue_submit(queue, &[submit_info], fence)
        });

        let result = match submitted {
            Ok(()) => self.device.wait_for_fences(&[fence], true, u64::MAX)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to wait for upload fence: {:?}", e)),
            Err(e) => Err(engine_err!("flare::vulkan", "Failed to submit upload commands: {:?}", e)),
        };

        self.device.destroy_fence(fence, None);
        result
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> Result<()> {
        let _guard = self.queue_lock.lock();
        unsafe {
            self.device.device_wait_idle()
                .map_err(|e| engine_err!("flare::vulkan", "Failed to wait for device idle: {:?}", e))
        }
    }

    /// Map an allocation failure to `OutOfMemory`, logging what was requested
    pub(crate) fn out_of_memory(what: &str, size: u64, e: gpu_allocator::AllocationError) -> Error {
        engine_error!("flare::vulkan", "Out of GPU memory for {} ({} bytes): {:?}", what, size, e);
        Error::OutOfMemory
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            self.device.destroy_command_pool(*self.upload_command_pool.get_mut(), None);

            // The allocator must release its memory blocks before the device goes
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            crate::debug::cleanup_debug_config();
            if let (Some(loader), Some(messenger)) = (&self.debug_utils_loader, self.debug_messenger) {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}
