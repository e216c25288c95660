/// CommandList trait - for recording rendering commands

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::renderer::{
    Pipeline, BindingSet, Model, RenderTexture, ShaderStages,
};

/// Render pass destination
#[derive(Clone)]
pub enum RenderTargetRef {
    /// The swapchain image acquired for this frame (or the headless
    /// offscreen image)
    Swapchain { image_index: u32 },
    /// An offscreen render texture
    Texture(Arc<dyn RenderTexture>),
}

/// A resource a recorded command list reads on the GPU
#[derive(Clone)]
pub enum BoundResource {
    Pipeline(Arc<dyn Pipeline>),
    BindingSet(Arc<dyn BindingSet>),
    Model(Arc<dyn Model>),
    RenderTexture(Arc<dyn RenderTexture>),
}

/// Command list for recording rendering commands
///
/// Command lists are allocated per flight frame, recorded on a worker
/// thread and later submitted in camera order via `Renderer::submit`.
///
/// Everything bound into a list (pipelines, binding sets, models, render
/// textures) stays alive until `Renderer::reset_command_lists` recycles
/// the list's flight frame, even if the list itself is dropped first.
/// The host may drop its own reference as soon as recording is done.
pub trait CommandList: Send {
    /// Begin recording commands
    fn begin(&mut self) -> Result<()>;

    /// End recording commands
    fn end(&mut self) -> Result<()>;

    /// Begin a render pass
    ///
    /// # Arguments
    ///
    /// * `target` - Swapchain image or render texture to draw into
    /// * `clear_values` - One clear value per attachment (colors, then depth)
    fn begin_render_pass(&mut self, target: &RenderTargetRef, clear_values: &[ClearValue]) -> Result<()>;

    /// End the current render pass
    fn end_render_pass(&mut self) -> Result<()>;

    /// Set the viewport
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// Set the scissor rectangle
    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()>;

    /// Bind a binding set at `set_index` of the pipeline layout
    ///
    /// # Arguments
    ///
    /// * `pipeline` - Pipeline the set is bound for (supplies the layout)
    /// * `set_index` - Set index (0 = static textures, higher = push bindings)
    /// * `set` - The binding set to bind
    fn bind_binding_set(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        set: &Arc<dyn BindingSet>,
    ) -> Result<()>;

    /// Push constants to the pipeline
    ///
    /// # Arguments
    ///
    /// * `pipeline` - Pipeline whose layout declares the range
    /// * `stages` - Shader stages that will access the push constants
    /// * `offset` - Offset in bytes into push constant range
    /// * `data` - Data to push
    fn push_constants(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    ) -> Result<()>;

    /// Bind the vertex and index buffers of a model
    fn bind_model(&mut self, model: &Arc<dyn Model>) -> Result<()>;

    /// Draw indexed vertices
    ///
    /// # Arguments
    ///
    /// * `index_count` - Number of indices to draw
    /// * `first_index` - Index of first index
    /// * `vertex_offset` - Value added to vertex index before indexing into the vertex buffer
    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()>;

    /// Draw non-indexed vertices
    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    /// Copy the first color attachment of `src` into `dst`, scaling to fit.
    ///
    /// Must be recorded outside a render pass.
    fn blit(&mut self, src: &Arc<dyn RenderTexture>, dst: &RenderTargetRef) -> Result<()>;

    /// Downcast hook for the backend
    fn as_any(&self) -> &dyn Any;
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    /// Depth/stencil clear value
    DepthStencil { depth: f32, stencil: u32 },
}
