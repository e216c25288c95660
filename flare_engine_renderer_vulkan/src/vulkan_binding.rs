/// Binding layouts, sets and pools over Vulkan descriptor sets
///
/// Each set owns one host-visible buffer per uniform slot of its layout;
/// the buffer is bound once when the set is allocated and `write_uniform`
/// copies straight into its mapped memory.

use ash::vk;
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::flare::render::{
    BindingLayout as RendererBindingLayout, BindingLayoutDesc, BindingPool as RendererBindingPool,
    BindingSet as RendererBindingSet, BindingType, Sampler as RendererSampler,
};
use flare_engine::{engine_bail, engine_err};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{binding_type_to_vk, downcast, stages_to_vk};
use crate::vulkan_sampler::Sampler;

// ============================================================================
// Layout
// ============================================================================

pub struct BindingLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::DescriptorSetLayout,
    desc: BindingLayoutDesc,
}

impl BindingLayout {
    pub fn new(ctx: Arc<GpuContext>, desc: &BindingLayoutDesc) -> Result<Self> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc.entries.iter()
            .map(|entry| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(entry.binding)
                    .descriptor_type(binding_type_to_vk(entry.binding_type))
                    .descriptor_count(1)
                    .stage_flags(stages_to_vk(entry.stages))
            })
            .collect();

        let layout = create_set_layout(&ctx.device, &bindings)?;
        Ok(Self { ctx, layout, desc: desc.clone() })
    }

    /// Descriptor counts needed for `sets` sets of this layout
    fn pool_sizes(&self, sets: u32) -> Vec<vk::DescriptorPoolSize> {
        let mut counts: FxHashMap<vk::DescriptorType, u32> = FxHashMap::default();
        for entry in &self.desc.entries {
            *counts.entry(binding_type_to_vk(entry.binding_type)).or_insert(0) += sets;
        }
        counts.into_iter()
            .map(|(ty, descriptor_count)| vk::DescriptorPoolSize { ty, descriptor_count })
            .collect()
    }
}

pub(crate) fn create_set_layout(
    device: &ash::Device,
    bindings: &[vk::DescriptorSetLayoutBinding],
) -> Result<vk::DescriptorSetLayout> {
    let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
    unsafe {
        device.create_descriptor_set_layout(&create_info, None)
            .map_err(|e| engine_err!("flare::vulkan", "Failed to create descriptor set layout: {:?}", e))
    }
}

impl RendererBindingLayout for BindingLayout {
    fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for BindingLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

// ============================================================================
// Descriptor pool
// ============================================================================

/// Descriptor pool shared by the sets allocated from it
struct DescriptorPool {
    ctx: Arc<GpuContext>,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    fn new(ctx: Arc<GpuContext>, layout: &BindingLayout, max_sets: u32) -> Result<Arc<Self>> {
        let mut sizes = layout.pool_sizes(max_sets);
        if sizes.is_empty() {
            // Empty layouts still need a non-empty pool
            sizes.push(vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_BUFFER, descriptor_count: 1 });
        }

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&sizes)
            .max_sets(max_sets.max(1));

        let pool = unsafe {
            ctx.device.create_descriptor_pool(&create_info, None)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to create descriptor pool: {:?}", e))?
        };
        Ok(Arc::new(Self { ctx, pool }))
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

// ============================================================================
// Set
// ============================================================================

pub struct BindingSet {
    ctx: Arc<GpuContext>,
    pub(crate) set: vk::DescriptorSet,
    uniforms: FxHashMap<u32, Buffer>,
    /// Keeps the pool alive while the set exists
    _pool: Arc<DescriptorPool>,
}

impl BindingSet {
    fn allocate(pool: &Arc<DescriptorPool>, layout: &BindingLayout) -> Result<Self> {
        let ctx = Arc::clone(&pool.ctx);
        let layouts = [layout.layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool.pool)
            .set_layouts(&layouts);

        let set = unsafe {
            ctx.device.allocate_descriptor_sets(&alloc_info)
                .map_err(|e| engine_err!("flare::vulkan", ResourceExhausted:
                    "Failed to allocate descriptor set: {:?}", e))?[0]
        };

        let mut uniforms = FxHashMap::default();
        for entry in layout.desc.entries.iter().filter(|e| e.binding_type == BindingType::UniformBuffer) {
            let buffer = Buffer::new(
                Arc::clone(&ctx),
                u64::from(entry.uniform_size.max(4)),
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                MemoryLocation::CpuToGpu,
                "uniform block",
            )?;

            let buffer_info = [vk::DescriptorBufferInfo {
                buffer: buffer.buffer,
                offset: 0,
                range: vk::WHOLE_SIZE,
            }];
            let write = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(entry.binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_info);
            unsafe {
                ctx.device.update_descriptor_sets(&[write], &[]);
            }

            uniforms.insert(entry.binding, buffer);
        }

        Ok(Self { ctx, set, uniforms, _pool: Arc::clone(pool) })
    }

    /// A set with its own single-set pool
    pub fn standalone(ctx: Arc<GpuContext>, layout: &BindingLayout) -> Result<Self> {
        let pool = DescriptorPool::new(ctx, layout, 1)?;
        Self::allocate(&pool, layout)
    }
}

impl RendererBindingSet for BindingSet {
    fn write_sampler(&self, binding: u32, sampler: &Arc<dyn RendererSampler>) -> Result<()> {
        let sampler = downcast::<Sampler>(sampler.as_any(), "Sampler")?;
        let image_info = [vk::DescriptorImageInfo {
            sampler: sampler.sampler,
            image_view: sampler.image_view()?,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];

        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);

        unsafe {
            self.ctx.device.update_descriptor_sets(&[write], &[]);
        }
        Ok(())
    }

    fn write_uniform(&self, binding: u32, data: &[u8]) -> Result<()> {
        match self.uniforms.get(&binding) {
            Some(buffer) => buffer.write(0, data),
            None => engine_bail!("flare::vulkan", BindingNotFound: "Binding {} is not a uniform block", binding),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Pool
// ============================================================================

struct PoolSlots {
    /// Sets allocated so far, reused after `reset`
    sets: Vec<Arc<BindingSet>>,
    next: usize,
}

/// Fixed-capacity set allocator
///
/// Sets are created on first use and handed out again after `reset`, so a
/// steady-state frame allocates no descriptors.
pub struct BindingPool {
    layout: Arc<dyn RendererBindingLayout>,
    pool: Arc<DescriptorPool>,
    capacity: u32,
    slots: Mutex<PoolSlots>,
}

impl BindingPool {
    pub fn new(ctx: Arc<GpuContext>, layout: &Arc<dyn RendererBindingLayout>, capacity: u32) -> Result<Self> {
        if capacity == 0 {
            engine_bail!("flare::vulkan", InvalidResource: "Binding pool capacity must be at least 1");
        }
        let vk_layout = downcast::<BindingLayout>(layout.as_any(), "BindingLayout")?;
        let pool = DescriptorPool::new(ctx, vk_layout, capacity)?;
        Ok(Self {
            layout: Arc::clone(layout),
            pool,
            capacity,
            slots: Mutex::new(PoolSlots { sets: Vec::new(), next: 0 }),
        })
    }
}

impl RendererBindingPool for BindingPool {
    fn allocate(&self) -> Result<Arc<dyn RendererBindingSet>> {
        let mut slots = self.slots.lock();
        if slots.next >= self.capacity as usize {
            engine_bail!("flare::vulkan", ResourceExhausted:
                "Binding pool exhausted ({} sets)", self.capacity);
        }

        if slots.next == slots.sets.len() {
            let layout = downcast::<BindingLayout>(self.layout.as_any(), "BindingLayout")?;
            let set = BindingSet::allocate(&self.pool, layout)?;
            slots.sets.push(Arc::new(set));
        }

        let set = Arc::clone(&slots.sets[slots.next]);
        slots.next += 1;
        Ok(set)
    }

    fn reset(&self) -> Result<()> {
        self.slots.lock().next = 0;
        Ok(())
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }
}
