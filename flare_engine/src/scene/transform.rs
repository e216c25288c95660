/// Transform resolution seam.
///
/// The transform graph belongs to the host. The engine only ever asks for
/// the world matrix of a handle, from the render thread and from the
/// per-camera worker threads.

use glam::Mat4;
use crate::error::Result;
use crate::handles::TransformHandle;
use crate::utils::HandleTable;

/// Resolves a transform handle to its world matrix
pub trait TransformResolver: Send + Sync {
    /// World matrix of `transform` (parent chain already applied)
    fn world_matrix(&self, transform: TransformHandle) -> Result<Mat4>;
}

/// Flat transform store without hierarchy.
///
/// Useful for hosts whose scene graph already flattens matrices, and for
/// tests.
#[derive(Default)]
pub struct FlatTransforms {
    table: HandleTable<TransformHandle, Mat4>,
}

impl FlatTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, world: Mat4) -> TransformHandle {
        self.table.generate(world)
    }

    pub fn set(&self, transform: TransformHandle, world: Mat4) -> Result<()> {
        self.table.set(transform, world)
    }

    pub fn remove(&self, transform: TransformHandle) -> Result<()> {
        self.table.destroy(transform).map(|_| ())
    }
}

impl TransformResolver for FlatTransforms {
    fn world_matrix(&self, transform: TransformHandle) -> Result<Mat4> {
        self.table.get(transform)
    }
}
