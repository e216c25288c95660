/// Model - device-local vertex and index buffers

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::flare::render::{Model as RendererModel, ModelDesc};
use flare_engine::engine_bail;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;

pub struct Model {
    pub(crate) vertex_buffer: Buffer,
    /// `None` when the model has no indices
    pub(crate) index_buffer: Option<Buffer>,
    vertex_count: u32,
    index_count: u32,
}

impl Model {
    pub fn upload(ctx: Arc<GpuContext>, desc: &ModelDesc) -> Result<Self> {
        if !desc.is_consistent() {
            engine_bail!("flare::vulkan", InvalidResource:
                "Model vertex data is {} bytes, expected {} vertices of {} bytes",
                desc.vertices.len(), desc.vertex_count, desc.stride);
        }

        let vertex_buffer = Buffer::device_local(
            Arc::clone(&ctx),
            desc.vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            "vertex buffer",
        )?;

        let index_buffer = if desc.indices.is_empty() {
            None
        } else {
            Some(Buffer::device_local(
                ctx,
                bytemuck::cast_slice(desc.indices),
                vk::BufferUsageFlags::INDEX_BUFFER,
                "index buffer",
            )?)
        };

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: desc.vertex_count,
            index_count: desc.indices.len() as u32,
        })
    }
}

impl RendererModel for Model {
    fn index_count(&self) -> u32 {
        self.index_count
    }

    fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
