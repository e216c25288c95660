/// Renderer module - backend-agnostic GPU interface
///
/// The traits here are the seam between the engine core and a graphics
/// backend (see the `flare_engine_renderer_vulkan` crate).

mod renderer;
mod command_list;
mod shader;
mod model;
mod texture;
mod binding;
mod pipeline;

#[cfg(test)]
pub mod mock_renderer;

pub use renderer::{Renderer, Semaphore, Fence, SubmitInfo, AcquireResult};
pub use command_list::{CommandList, BoundResource, RenderTargetRef, Viewport, Rect2D, ClearValue};
pub use shader::{Shader, ShaderDesc, ShaderStage, ShaderStages, ShaderCompiler};
pub use model::{Model, ModelDesc};
pub use texture::{
    Texture, TextureDesc, Sampler, SamplerDesc, SamplerSource, FilterMode, AddressMode,
    RenderTexture, RenderTextureDesc,
};
pub use binding::{
    BindingType, BindingSlotDesc, BindingLayoutDesc, BindingLayout, BindingSet, BindingPool,
};
pub use pipeline::{
    Pipeline, PipelineDesc, PipelineLayoutDesc, PushConstantRange, TargetLayout,
    CullingMode, PrimitiveMode, VertexType, VertexInputAttrib,
};
