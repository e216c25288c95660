//! Scene-side data the renderer consumes
//!
//! Camera and light buffers, mesh instances, the render-stack batcher and
//! the transform resolution seam. Everything here is plain data; GPU work
//! happens in the frame module.

mod camera;
mod light;
mod mesh_render;
mod batcher;
mod transform;

pub use camera::{
    CameraBuffer, CameraViewport, CameraShaderBuffer, ModelShaderBuffer,
    screen_to_world, world_to_screen,
};
pub use light::{
    LightKind,
    DirectionalLightBuffer, PointLightBuffer, SpotLightBuffer,
    DirectionalLightShaderBuffer, PointLightShaderBuffer, SpotLightShaderBuffer,
};
pub use mesh_render::MeshRenderBuffer;
pub use batcher::{RenderStackBatcher, MaterialRenderStack, ModelGroup};
pub use transform::{TransformResolver, FlatTransforms};
