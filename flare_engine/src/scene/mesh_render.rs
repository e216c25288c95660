/// One renderable instance: which material draws which model where.

use crate::handles::{ProgramHandle, ModelHandle, TransformHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshRenderBuffer {
    pub material: ProgramHandle,
    pub model: ModelHandle,
    pub transform: TransformHandle,
}
