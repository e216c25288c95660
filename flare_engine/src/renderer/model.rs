/// Model trait - vertex + index buffer pair uploaded from host bytes

use std::any::Any;

/// Model creation descriptor
///
/// Vertices are opaque bytes laid out as `vertex_count` records of
/// `stride` bytes; the program's vertex attributes describe the layout.
pub struct ModelDesc<'a> {
    /// Raw vertex bytes
    pub vertices: &'a [u8],
    /// Number of vertices in `vertices`
    pub vertex_count: u32,
    /// 32-bit indices
    pub indices: &'a [u32],
    /// Size of one vertex in bytes
    pub stride: u16,
}

impl ModelDesc<'_> {
    /// Whether the vertex byte count matches `vertex_count * stride`
    pub fn is_consistent(&self) -> bool {
        self.stride > 0 && self.vertices.len() == self.vertex_count as usize * self.stride as usize
    }
}

/// GPU-resident model
pub trait Model: Send + Sync {
    /// Number of indices to draw
    fn index_count(&self) -> u32;

    /// Number of vertices
    fn vertex_count(&self) -> u32;

    /// Downcast hook for the backend
    fn as_any(&self) -> &dyn Any;
}
