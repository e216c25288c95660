/// Render program - declarative description of a material.
///
/// A program names its two shader modules, the fixed-function state the
/// pipeline is built with, the vertex layout, and the list of resources
/// its shaders read (`ShaderBufferInput`). How each input is bound is
/// decided later, when the binding layout is derived for a pipeline.

use bitflags::bitflags;
use crate::handles::ShaderHandle;
use crate::renderer::{ShaderStages, CullingMode, PrimitiveMode, VertexInputAttrib};
use crate::scene::{
    CameraShaderBuffer, ModelShaderBuffer,
    DirectionalLightShaderBuffer, PointLightShaderBuffer, SpotLightShaderBuffer,
};

/// What a shader buffer input carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderBufferKind {
    /// Camera matrices, pushed when the material is bound
    Camera,
    /// Model matrix, pushed as a push constant before each draw
    Model,
    DirectionalLight,
    PointLight,
    SpotLight,
    /// Texture fixed on the material (`set_program_texture`)
    Texture,
    /// Texture supplied per draw (`push_texture`)
    PushTexture,
}

impl ShaderBufferKind {
    /// Size in bytes of the uniform block behind this input (0 for textures)
    pub fn uniform_size(self) -> u32 {
        let size = match self {
            ShaderBufferKind::Camera => std::mem::size_of::<CameraShaderBuffer>(),
            ShaderBufferKind::Model => std::mem::size_of::<ModelShaderBuffer>(),
            ShaderBufferKind::DirectionalLight => std::mem::size_of::<DirectionalLightShaderBuffer>(),
            ShaderBufferKind::PointLight => std::mem::size_of::<PointLightShaderBuffer>(),
            ShaderBufferKind::SpotLight => std::mem::size_of::<SpotLightShaderBuffer>(),
            ShaderBufferKind::Texture | ShaderBufferKind::PushTexture => 0,
        };
        size as u32
    }

    /// Whether the input is sampled rather than read as a uniform block
    pub fn is_texture(self) -> bool {
        matches!(self, ShaderBufferKind::Texture | ShaderBufferKind::PushTexture)
    }
}

/// One resource binding slot of a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderBufferInput {
    /// Binding number inside its set
    pub slot: u16,
    /// Set index (static textures live in set 0)
    pub set: u16,
    pub kind: ShaderBufferKind,
    /// Stages that read the input
    pub stages: ShaderStages,
}

impl ShaderBufferInput {
    /// Input in set 0
    pub fn new(slot: u16, kind: ShaderBufferKind, stages: ShaderStages) -> Self {
        Self { slot, set: 0, kind, stages }
    }

    /// Same input placed in another set
    pub fn in_set(mut self, set: u16) -> Self {
        self.set = set;
        self
    }
}

bitflags! {
    /// Lifetime flags of a program
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProgramFlags: u32 {
        /// Destroying the program also destroys both of its shaders
        const DESTROY_SHADERS = 0b1;
    }
}

/// Declarative material description
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProgram {
    pub vertex_shader: ShaderHandle,
    pub pixel_shader: ShaderHandle,
    /// Cameras draw this program only when their layer mask intersects it
    pub render_layer: u32,
    /// Size of one vertex in bytes; 0 for programs that read no vertex buffer
    pub vertex_stride: u16,
    pub vertex_attributes: Vec<VertexInputAttrib>,
    pub shader_buffer_inputs: Vec<ShaderBufferInput>,
    pub culling_mode: CullingMode,
    pub primitive_mode: PrimitiveMode,
    pub enable_color_blending: bool,
    pub flags: ProgramFlags,
}

impl RenderProgram {
    /// Program drawing triangles with back-face culling on every layer
    pub fn new(vertex_shader: ShaderHandle, pixel_shader: ShaderHandle) -> Self {
        Self {
            vertex_shader,
            pixel_shader,
            render_layer: u32::MAX,
            vertex_stride: 0,
            vertex_attributes: Vec::new(),
            shader_buffer_inputs: Vec::new(),
            culling_mode: CullingMode::default(),
            primitive_mode: PrimitiveMode::default(),
            enable_color_blending: false,
            flags: ProgramFlags::empty(),
        }
    }

    /// Whether replacing `self` with `other` requires rebuilding pipelines.
    ///
    /// Only the render layer and the lifetime flags can change without it.
    pub fn pipeline_state_differs(&self, other: &RenderProgram) -> bool {
        self.vertex_shader != other.vertex_shader
            || self.pixel_shader != other.pixel_shader
            || self.vertex_stride != other.vertex_stride
            || self.vertex_attributes != other.vertex_attributes
            || self.shader_buffer_inputs != other.shader_buffer_inputs
            || self.culling_mode != other.culling_mode
            || self.primitive_mode != other.primitive_mode
            || self.enable_color_blending != other.enable_color_blending
    }

    /// First input of `kind`, if declared
    pub fn input(&self, kind: ShaderBufferKind) -> Option<&ShaderBufferInput> {
        self.shader_buffer_inputs.iter().find(|i| i.kind == kind)
    }

    pub fn has_input(&self, kind: ShaderBufferKind) -> bool {
        self.input(kind).is_some()
    }
}
