/// VulkanRenderer - Vulkan implementation of the Renderer trait
///
/// Either presents to a window surface through a swapchain, or renders into
/// an offscreen image that is read back after every frame (headless).

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::{Mutex, RwLock};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CString};
use std::sync::Arc;
use flare_engine::flare::{Config, Error, Result};
use flare_engine::flare::render::{
    AcquireResult, BindingLayout as RendererBindingLayout, BindingLayoutDesc,
    BindingPool as RendererBindingPool, BindingSet as RendererBindingSet,
    CommandList as RendererCommandList, Fence, Model as RendererModel, ModelDesc,
    Pipeline as RendererPipeline, PipelineDesc, RenderTexture as RendererRenderTexture,
    RenderTextureDesc, Renderer, Sampler as RendererSampler, SamplerDesc, Semaphore,
    Shader as RendererShader, ShaderDesc, SubmitInfo, TargetLayout,
    Texture as RendererTexture, TextureDesc,
};
use flare_engine::{engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_binding::{BindingLayout, BindingPool, BindingSet};
use crate::vulkan_command_list::CommandList;
use crate::vulkan_command_pools::CommandPools;
use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::downcast;
use crate::vulkan_headless::{HeadlessTarget, HEADLESS_SURFACE};
use crate::vulkan_model::Model;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::RenderPassCache;
use crate::vulkan_render_texture::RenderTexture;
use crate::vulkan_sampler::Sampler;
use crate::vulkan_shader::Shader;
use crate::vulkan_surface::SurfaceTargets;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_sync::SyncObjects;

/// Where finished frames go
enum Presentation {
    Window(Mutex<Swapchain>),
    Headless(Mutex<HeadlessTarget>),
}

/// Instance-level objects created before a device is picked
struct InstanceParts {
    entry: ash::Entry,
    instance: ash::Instance,
    debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

/// Chosen physical device and its graphics queue family
struct DeviceChoice {
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
}

pub struct VulkanRenderer {
    // Field order is drop order: everything below releases its Vulkan
    // objects through `ctx`, which destroys the device last.
    presentation: Presentation,
    surface_targets: Arc<RwLock<SurfaceTargets>>,
    command_pools: Arc<CommandPools>,
    sync: SyncObjects,
    render_passes: RenderPassCache,
    ctx: Arc<GpuContext>,
}

impl VulkanRenderer {
    // ===== CONSTRUCTION =====

    /// Create a presenting renderer for a window
    ///
    /// # Arguments
    ///
    /// * `window` - Window providing display and window handles
    /// * `width`, `height` - Initial surface size in pixels
    /// * `config` - Engine configuration (application name, validation)
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        width: u32,
        height: u32,
        config: &Config,
    ) -> Result<Self> {
        let display_handle = window.display_handle()
            .map_err(|e| init_error(format!("Failed to get display handle: {}", e)))?;
        let window_handle = window.window_handle()
            .map_err(|e| init_error(format!("Failed to get window handle: {}", e)))?;

        let surface_extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| init_error(format!("Failed to get required surface extensions: {:?}", e)))?
            .to_vec();

        let parts = create_instance(config, surface_extensions)?;

        let surface = unsafe {
            ash_window::create_surface(&parts.entry, &parts.instance, display_handle.as_raw(), window_handle.as_raw(), None)
                .map_err(|e| init_error(format!("Failed to create surface: {:?}", e)))?
        };
        let surface_loader = ash::khr::surface::Instance::new(&parts.entry, &parts.instance);

        let choice = pick_device(&parts.instance, Some((&surface_loader, surface)))?;
        let ctx = create_context(parts, choice, &[ash::khr::swapchain::NAME.as_ptr()])?;

        let format = Swapchain::choose_format(&ctx, &surface_loader, surface)?;
        let render_passes = RenderPassCache::new(Arc::clone(&ctx), Swapchain::surface_format(format));
        let render_pass = render_passes.get(TargetLayout::Swapchain)?;
        let swapchain = Swapchain::new(Arc::clone(&ctx), surface, surface_loader, format, render_pass, width, height)?;

        let targets = swapchain.targets();
        Ok(Self::assemble(ctx, render_passes, Presentation::Window(Mutex::new(swapchain)), targets))
    }

    /// Create a presenting renderer for a winit window at its current size
    pub fn from_window(window: &winit::window::Window, config: &Config) -> Result<Self> {
        let size = window.inner_size();
        Self::new(window, size.width, size.height, config)
    }

    /// Create a headless renderer drawing into a `width` x `height` RGBA8 image
    pub fn headless(width: u32, height: u32, config: &Config) -> Result<Self> {
        let parts = create_instance(config, Vec::new())?;
        let choice = pick_device(&parts.instance, None)?;
        let ctx = create_context(parts, choice, &[])?;

        let render_passes = RenderPassCache::new(Arc::clone(&ctx), HEADLESS_SURFACE);
        let render_pass = render_passes.get(TargetLayout::Swapchain)?;
        let target = HeadlessTarget::new(Arc::clone(&ctx), render_pass, width, height)?;

        let targets = target.targets();
        Ok(Self::assemble(ctx, render_passes, Presentation::Headless(Mutex::new(target)), targets))
    }

    fn assemble(
        ctx: Arc<GpuContext>,
        render_passes: RenderPassCache,
        presentation: Presentation,
        targets: SurfaceTargets,
    ) -> Self {
        engine_info!("flare::vulkan", "Vulkan renderer ready ({}, {}x{})",
            if matches!(presentation, Presentation::Headless(_)) { "headless" } else { "windowed" },
            targets.extent.width, targets.extent.height);

        Self {
            presentation,
            surface_targets: Arc::new(RwLock::new(targets)),
            command_pools: Arc::new(CommandPools::new(Arc::clone(&ctx))),
            sync: SyncObjects::new(Arc::clone(&ctx)),
            render_passes,
            ctx,
        }
    }

    /// Render pass for a render texture of `desc`
    fn texture_render_pass(&self, desc: &RenderTextureDesc) -> Result<vk::RenderPass> {
        self.render_passes.get(TargetLayout::Texture {
            color_count: desc.count,
            depth: desc.depth,
            hdr: desc.hdr,
        })
    }
}

fn init_error(message: String) -> Error {
    engine_error!("flare::vulkan", "{}", message);
    Error::InitializationFailed(message)
}

fn create_instance(config: &Config, mut extensions: Vec<*const c_char>) -> Result<InstanceParts> {
    let validation = config.enable_validation && cfg!(feature = "vulkan-validation");
    if config.enable_validation && !validation {
        engine_warn!("flare::vulkan", "Validation requested but the vulkan-validation feature is disabled");
    }

    unsafe {
        let entry = ash::Entry::load()
            .map_err(|e| init_error(format!("Failed to load Vulkan library: {:?}", e)))?;

        let app_name = CString::new(config.application_name.as_str())
            .unwrap_or_else(|_| CString::from(c"Flare Application"));
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Flare")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        let layers = if validation { vec![c"VK_LAYER_KHRONOS_validation".as_ptr()] } else { Vec::new() };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions);

        let instance = entry.create_instance(&create_info, None)
            .map_err(|e| init_error(format!("Failed to create instance: {:?}", e)))?;

        let (debug_utils_loader, debug_messenger) = if validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            crate::debug::init_debug_config(config.debug_severity);

            let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(crate::debug::severity_flags(config.debug_severity))
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

            match loader.create_debug_utils_messenger(&debug_info, None) {
                Ok(messenger) => (Some(loader), Some(messenger)),
                Err(e) => {
                    instance.destroy_instance(None);
                    return Err(init_error(format!("Failed to create debug messenger: {:?}", e)));
                }
            }
        } else {
            (None, None)
        };

        Ok(InstanceParts { entry, instance, debug_utils_loader, debug_messenger })
    }
}

/// Pick a device with a graphics queue (that can also present to `surface`),
/// preferring discrete GPUs
fn pick_device(
    instance: &ash::Instance,
    surface: Option<(&ash::khr::surface::Instance, vk::SurfaceKHR)>,
) -> Result<DeviceChoice> {
    let devices = unsafe {
        instance.enumerate_physical_devices()
            .map_err(|e| init_error(format!("Failed to enumerate physical devices: {:?}", e)))?
    };

    let mut best: Option<(DeviceChoice, bool)> = None;
    for physical_device in devices {
        let families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let queue_family = families.iter().enumerate()
            .filter(|(_, family)| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|(index, _)| index as u32)
            .find(|&index| match surface {
                Some((loader, surface)) => unsafe {
                    loader.get_physical_device_surface_support(physical_device, index, surface).unwrap_or(false)
                },
                None => true,
            });

        let Some(queue_family) = queue_family else { continue };
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;

        if best.as_ref().map_or(true, |(_, best_discrete)| discrete && !best_discrete) {
            best = Some((DeviceChoice { physical_device, queue_family }, discrete));
        }
    }

    best.map(|(choice, _)| choice)
        .ok_or_else(|| init_error("No Vulkan device with a usable graphics queue found".to_string()))
}

fn create_context(
    parts: InstanceParts,
    choice: DeviceChoice,
    device_extensions: &[*const c_char],
) -> Result<Arc<GpuContext>> {
    unsafe {
        let priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(choice.queue_family)
            .queue_priorities(&priorities)];
        let features = vk::PhysicalDeviceFeatures::default();

        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(device_extensions)
            .enabled_features(&features);

        let device = parts.instance.create_device(choice.physical_device, &device_info, None)
            .map_err(|e| init_error(format!("Failed to create device: {:?}", e)))?;
        let graphics_queue = device.get_device_queue(choice.queue_family, 0);

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: parts.instance.clone(),
            device: device.clone(),
            physical_device: choice.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| init_error(format!("Failed to create allocator: {:?}", e)))?;

        let upload_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(choice.queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_command_pool = device.create_command_pool(&upload_pool_info, None)
            .map_err(|e| init_error(format!("Failed to create upload command pool: {:?}", e)))?;

        Ok(Arc::new(GpuContext::new(
            parts.entry,
            parts.instance,
            choice.physical_device,
            device,
            allocator,
            graphics_queue,
            choice.queue_family,
            upload_command_pool,
            parts.debug_utils_loader,
            parts.debug_messenger,
        )))
    }
}

impl Renderer for VulkanRenderer {
    // ===== RESOURCES =====

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn RendererShader>> {
        Ok(Arc::new(Shader::new(Arc::clone(&self.ctx), &desc)?))
    }

    fn create_model(&self, desc: ModelDesc) -> Result<Arc<dyn RendererModel>> {
        Ok(Arc::new(Model::upload(Arc::clone(&self.ctx), &desc)?))
    }

    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn RendererTexture>> {
        Ok(Arc::new(crate::vulkan_texture::Texture::upload(Arc::clone(&self.ctx), &desc)?))
    }

    fn create_sampler(&self, desc: SamplerDesc) -> Result<Arc<dyn RendererSampler>> {
        Ok(Arc::new(Sampler::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_render_texture(&self, desc: RenderTextureDesc) -> Result<Arc<dyn RendererRenderTexture>> {
        let render_pass = self.texture_render_pass(&desc)?;
        Ok(Arc::new(RenderTexture::new(Arc::clone(&self.ctx), desc, render_pass)?))
    }

    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn RendererBindingLayout>> {
        Ok(Arc::new(BindingLayout::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_binding_set(&self, layout: &Arc<dyn RendererBindingLayout>) -> Result<Arc<dyn RendererBindingSet>> {
        let layout = downcast::<BindingLayout>(layout.as_any(), "BindingLayout")?;
        Ok(Arc::new(BindingSet::standalone(Arc::clone(&self.ctx), layout)?))
    }

    fn create_binding_pool(
        &self,
        layout: &Arc<dyn RendererBindingLayout>,
        capacity: u32,
    ) -> Result<Box<dyn RendererBindingPool>> {
        Ok(Box::new(BindingPool::new(Arc::clone(&self.ctx), layout, capacity)?))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn RendererPipeline>> {
        let render_pass = self.render_passes.get(desc.target)?;
        Ok(Arc::new(Pipeline::new(Arc::clone(&self.ctx), desc, render_pass)?))
    }

    // ===== COMMANDS =====

    fn create_command_list(&self, flight_frame: usize) -> Result<Box<dyn RendererCommandList>> {
        Ok(Box::new(CommandList::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.command_pools),
            flight_frame,
            Arc::clone(&self.surface_targets),
        )?))
    }

    fn reset_command_lists(&self, flight_frame: usize) -> Result<()> {
        self.command_pools.reset(flight_frame)
    }

    // ===== SYNCHRONIZATION =====

    fn create_semaphore(&self) -> Result<Semaphore> {
        self.sync.create_semaphore()
    }

    fn create_fence(&self, signaled: bool) -> Result<Fence> {
        self.sync.create_fence(signaled)
    }

    fn wait_fence(&self, fence: Fence) -> Result<()> {
        self.sync.wait_fence(fence)
    }

    fn reset_fence(&self, fence: Fence) -> Result<()> {
        self.sync.reset_fence(fence)
    }

    fn submit(&self, info: SubmitInfo) -> Result<()> {
        let command_list = downcast::<CommandList>(info.command_list.as_any(), "CommandList")?;

        let wait = info.wait.map(|id| self.sync.semaphore(id)).transpose()?;
        let signal = info.signal.map(|id| self.sync.semaphore(id)).transpose()?;
        let fence = match info.fence {
            Some(id) => self.sync.fence(id)?,
            None => vk::Fence::null(),
        };

        let wait_semaphores: Vec<vk::Semaphore> = wait.into_iter().collect();
        let wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::TRANSFER; wait_semaphores.len()];
        let signal_semaphores: Vec<vk::Semaphore> = signal.into_iter().collect();
        let command_buffers = [command_list.command_buffer()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        self.ctx.with_queue(|queue| unsafe {
            self.ctx.device.queue_submit(queue, &[submit_info], fence)
        })
        .map_err(|e| engine_err!("flare::vulkan", "Failed to submit commands to GPU queue: {:?}", e))
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_idle()
    }

    // ===== PRESENTATION =====

    fn is_headless(&self) -> bool {
        matches!(self.presentation, Presentation::Headless(_))
    }

    fn surface_size(&self) -> (u32, u32) {
        let extent = self.surface_targets.read().extent;
        (extent.width, extent.height)
    }

    fn acquire_next_image(&self, signal: Semaphore) -> Result<AcquireResult> {
        match &self.presentation {
            Presentation::Window(swapchain) => swapchain.lock().acquire(self.sync.semaphore(signal)?),
            Presentation::Headless(_) => Ok(AcquireResult::Image(0)),
        }
    }

    fn present(&self, image_index: u32, wait: Semaphore) -> Result<bool> {
        match &self.presentation {
            Presentation::Window(swapchain) => swapchain.lock().present(image_index, self.sync.semaphore(wait)?),
            Presentation::Headless(_) => Ok(true),
        }
    }

    fn resize(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            engine_warn!("flare::vulkan", "Ignoring resize to {}x{}", width, height);
            return Ok(());
        }

        self.ctx.wait_idle()?;
        let targets = match &self.presentation {
            Presentation::Window(swapchain) => {
                let mut swapchain = swapchain.lock();
                swapchain.recreate(width, height)?;
                swapchain.targets()
            }
            Presentation::Headless(target) => {
                let mut target = target.lock();
                target.recreate(width, height)?;
                target.targets()
            }
        };
        *self.surface_targets.write() = targets;
        Ok(())
    }

    fn read_back_frame(&self) -> Result<Option<Vec<u8>>> {
        match &self.presentation {
            Presentation::Window(_) => Ok(None),
            Presentation::Headless(target) => target.lock().read_back().map(Some),
        }
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            engine_error!("flare::vulkan", "Device did not go idle before teardown: {}", e);
        }
    }
}
