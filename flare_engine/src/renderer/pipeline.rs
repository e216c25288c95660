/// Pipeline trait and pipeline descriptor
///
/// A pipeline is built for one (program, render target layout) pair; the
/// render target layout decides which render pass it is compatible with.

use std::any::Any;
use std::sync::Arc;
use crate::renderer::{BindingLayout, Shader, ShaderStages};

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullingMode {
    None,
    Front,
    #[default]
    Back,
    Both,
}

/// Primitive assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveMode {
    #[default]
    Triangles,
    TriangleStrip,
}

/// Component type of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexType {
    Float,
    Int,
    UInt,
}

/// One vertex attribute read from the interleaved vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexInputAttrib {
    /// Shader input location
    pub location: u16,
    /// Component type
    pub ty: VertexType,
    /// Component count (1..=4)
    pub count: u16,
    /// Byte offset inside one vertex
    pub offset: u16,
}

/// Attachments of the render pass a pipeline draws into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetLayout {
    /// The presentation surface (one color attachment, no depth)
    Swapchain,
    /// An offscreen render texture
    Texture {
        color_count: u32,
        depth: bool,
        hdr: bool,
    },
}

/// Push-constant range declared by a program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStages,
    pub offset: u32,
    pub size: u32,
}

/// Binding sets and push constants a pipeline is laid out for
#[derive(Clone, Default)]
pub struct PipelineLayoutDesc {
    pub push_constant: Option<PushConstantRange>,
    /// `(set index, layout)` pairs in ascending set order.
    /// Backends fill gaps between set indices with empty layouts.
    pub set_layouts: Vec<(u32, Arc<dyn BindingLayout>)>,
}

/// Pipeline creation descriptor
pub struct PipelineDesc<'a> {
    pub vertex_shader: &'a Arc<dyn Shader>,
    pub pixel_shader: &'a Arc<dyn Shader>,
    /// Size of one vertex; 0 means the pipeline reads no vertex buffer
    pub vertex_stride: u16,
    pub vertex_attributes: &'a [VertexInputAttrib],
    pub culling_mode: CullingMode,
    pub primitive_mode: PrimitiveMode,
    pub enable_color_blending: bool,
    pub target: TargetLayout,
    pub layout: &'a PipelineLayoutDesc,
}

/// Compiled, immutable GPU pipeline
pub trait Pipeline: Send + Sync {
    /// Render target layout this pipeline was built for
    fn target(&self) -> TargetLayout;

    fn as_any(&self) -> &dyn Any;
}
