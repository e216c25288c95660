/// Binding layouts, binding sets and binding pools.
///
/// A binding set is the backend's descriptor set: a group of resources
/// bound together at one set index of a pipeline. Layouts are derived from
/// a program's shader buffer inputs (see `binding::BindingLayoutInfo`); the
/// user never builds them by hand.

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::renderer::{Sampler, ShaderStages};

// ============================================================================
// Layout description
// ============================================================================

/// Type of resource bound at a given slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// Uniform buffer (camera and light parameters)
    UniformBuffer,
    /// Combined image sampler (texture + sampler in one binding)
    CombinedImageSampler,
}

/// Description of a single binding slot within a layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSlotDesc {
    /// Binding number (`layout(binding = N)` in GLSL)
    pub binding: u32,
    /// Type of resource at this binding
    pub binding_type: BindingType,
    /// Shader stages that access this binding
    pub stages: ShaderStages,
    /// Size in bytes of the backing uniform block (0 for samplers)
    pub uniform_size: u32,
}

/// Blueprint for a set of bindings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingLayoutDesc {
    pub entries: Vec<BindingSlotDesc>,
}

// ============================================================================
// Backend objects
// ============================================================================

/// Backend layout object created from a [`BindingLayoutDesc`]
pub trait BindingLayout: Send + Sync {
    fn desc(&self) -> &BindingLayoutDesc;
    fn as_any(&self) -> &dyn Any;
}

/// A set of resource bindings matching one layout
pub trait BindingSet: Send + Sync {
    /// Point `binding` at a sampler and the image it reads
    fn write_sampler(&self, binding: u32, sampler: &Arc<dyn Sampler>) -> Result<()>;

    /// Copy `data` into the uniform block behind `binding`
    fn write_uniform(&self, binding: u32, data: &[u8]) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Fixed-capacity allocator of binding sets, reset as a whole
pub trait BindingPool: Send + Sync {
    /// Allocate one set. Fails once `capacity` sets are live.
    fn allocate(&self) -> Result<Arc<dyn BindingSet>>;

    /// Return every set to the pool
    fn reset(&self) -> Result<()>;

    fn capacity(&self) -> u32;
}
