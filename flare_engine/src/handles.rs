//! Opaque handle types handed to the script host.
//!
//! Each kind indexes its own [`HandleTable`](crate::flare::utils::HandleTable),
//! so a camera handle can never be used to look up a model.

use crate::define_handle;

define_handle!(
    /// Compiled vertex or pixel shader module
    ShaderHandle, "shader");
define_handle!(
    /// Vertex + index buffer pair
    ModelHandle, "model");
define_handle!(
    /// Sampled 2D texture uploaded from host pixels
    TextureHandle, "texture");
define_handle!(
    /// Sampler view over a texture or render texture attachment
    TextureSamplerHandle, "texture sampler");
define_handle!(
    /// Multi-attachment offscreen render target
    RenderTextureHandle, "render texture");
define_handle!(
    /// Render program (material)
    ProgramHandle, "program");
define_handle!(
    /// Camera buffer
    CameraHandle, "camera");
define_handle!(DirectionalLightHandle, "directional light");
define_handle!(PointLightHandle, "point light");
define_handle!(SpotLightHandle, "spot light");
define_handle!(
    /// Drawable mesh instance (material + model + transform)
    MeshRenderHandle, "mesh render buffer");
define_handle!(
    /// Node of the host's transform graph, resolved through a
    /// [`TransformResolver`](crate::flare::scene::TransformResolver)
    TransformHandle, "transform");
