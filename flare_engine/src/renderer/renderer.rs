/// Renderer trait - backend factory and queue interface
///
/// All methods take `&self`: per-camera command lists are built on worker
/// threads that share one renderer, so backends synchronize internally.

use std::sync::Arc;
use crate::error::Result;
use crate::renderer::{
    Shader, ShaderDesc, Model, ModelDesc, Texture, TextureDesc,
    Sampler, SamplerDesc, RenderTexture, RenderTextureDesc,
    BindingLayout, BindingLayoutDesc, BindingSet, BindingPool,
    Pipeline, PipelineDesc, CommandList,
};

/// Opaque GPU-side semaphore id issued by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Semaphore(pub u64);

/// Opaque CPU-waitable fence id issued by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fence(pub u64);

/// One queue submission
pub struct SubmitInfo<'a> {
    /// Recorded command list
    pub command_list: &'a dyn CommandList,
    /// Semaphore to wait on before the list executes
    pub wait: Option<Semaphore>,
    /// Semaphore signaled when the list completes
    pub signal: Option<Semaphore>,
    /// Fence signaled when the list completes
    pub fence: Option<Fence>,
}

/// Outcome of asking the surface for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    /// Image `index` will be ready once the signal semaphore fires
    Image(u32),
    /// The surface changed size; recreate before rendering again
    OutOfDate,
}

/// Renderer trait
///
/// Creates GPU resources and drives the graphics queue. A backend is either
/// presenting (owns a window surface) or headless (renders into an offscreen
/// image that is read back after each frame).
pub trait Renderer: Send + Sync {
    // ===== RESOURCES =====

    /// Create a shader module from SPIR-V
    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>>;

    /// Upload a model
    fn create_model(&self, desc: ModelDesc) -> Result<Arc<dyn Model>>;

    /// Upload a texture
    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Create a sampler over a texture or render texture attachment
    fn create_sampler(&self, desc: SamplerDesc) -> Result<Arc<dyn Sampler>>;

    /// Create a render texture
    fn create_render_texture(&self, desc: RenderTextureDesc) -> Result<Arc<dyn RenderTexture>>;

    /// Create a binding layout
    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>>;

    /// Allocate a long-lived binding set
    fn create_binding_set(&self, layout: &Arc<dyn BindingLayout>) -> Result<Arc<dyn BindingSet>>;

    /// Create a pool of `capacity` binding sets for per-draw pushes
    fn create_binding_pool(&self, layout: &Arc<dyn BindingLayout>, capacity: u32) -> Result<Box<dyn BindingPool>>;

    /// Create a graphics pipeline
    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    // ===== COMMANDS =====

    /// Allocate a command list from the pools of `flight_frame`.
    ///
    /// Safe to call from several threads at once.
    fn create_command_list(&self, flight_frame: usize) -> Result<Box<dyn CommandList>>;

    /// Recycle every command list allocated for `flight_frame` and release
    /// the resources they kept alive.
    ///
    /// Only called once the GPU finished with them.
    fn reset_command_lists(&self, flight_frame: usize) -> Result<()>;

    // ===== SYNCHRONIZATION =====

    fn create_semaphore(&self) -> Result<Semaphore>;

    fn create_fence(&self, signaled: bool) -> Result<Fence>;

    /// Block until `fence` is signaled (no timeout)
    fn wait_fence(&self, fence: Fence) -> Result<()>;

    fn reset_fence(&self, fence: Fence) -> Result<()>;

    /// Submit one command list to the graphics queue
    fn submit(&self, info: SubmitInfo) -> Result<()>;

    /// Block until the device is idle
    fn wait_idle(&self) -> Result<()>;

    // ===== PRESENTATION =====

    /// Whether this backend renders without a window surface
    fn is_headless(&self) -> bool;

    /// Current size of the swapchain (or headless offscreen image)
    fn surface_size(&self) -> (u32, u32);

    /// Acquire the next swapchain image, signaling `signal` when it is ready.
    ///
    /// Headless backends return `Image(0)` without signaling.
    fn acquire_next_image(&self, signal: Semaphore) -> Result<AcquireResult>;

    /// Queue image `image_index` for presentation after `wait` fires.
    ///
    /// Returns `false` when the surface is out of date.
    fn present(&self, image_index: u32, wait: Semaphore) -> Result<bool>;

    /// Recreate the swapchain (or offscreen image) at a new size
    fn resize(&self, width: u32, height: u32) -> Result<()>;

    /// Tightly packed RGBA8 pixels of the last rendered headless frame.
    ///
    /// Presenting backends return `None`.
    fn read_back_frame(&self) -> Result<Option<Vec<u8>>>;
}
