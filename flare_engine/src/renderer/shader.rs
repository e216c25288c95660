/// Shader modules and the external shader compiler seam.

use std::any::Any;
use bitflags::bitflags;
use crate::error::Result;

/// Programmable stage a shader module is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

bitflags! {
    /// Shader stages that can see a binding or push-constant range
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 0b01;
        const PIXEL = 0b10;
        const ALL = Self::VERTEX.bits() | Self::PIXEL.bits();
    }
}

impl From<ShaderStage> for ShaderStages {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => ShaderStages::VERTEX,
            ShaderStage::Pixel => ShaderStages::PIXEL,
        }
    }
}

/// Shader module creation descriptor
pub struct ShaderDesc<'a> {
    /// Stage the module is used in
    pub stage: ShaderStage,
    /// Entry point name
    pub entry_point: &'a str,
    /// SPIR-V words
    pub code: &'a [u32],
}

/// Backend shader module
pub trait Shader: Send + Sync {
    /// Stage this module was created for
    fn stage(&self) -> ShaderStage;

    /// Downcast hook for the backend
    fn as_any(&self) -> &dyn Any;
}

/// Turns shader source text into SPIR-V.
///
/// Shader compilation lives outside the engine; the host installs an
/// implementation when the render context is created. It is called
/// synchronously from `generate_vertex_shader` / `generate_pixel_shader`.
pub trait ShaderCompiler: Send + Sync {
    /// Compile `source` for `stage`
    fn compile(&self, stage: ShaderStage, source: &str) -> Result<Vec<u32>>;
}
