/// Texture - sampled RGBA8 image uploaded from host pixels

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::flare::render::{Texture as RendererTexture, TextureDesc};
use flare_engine::engine_bail;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::COLOR_FORMAT;
use crate::vulkan_image::Image;

pub struct Texture {
    pub(crate) image: Image,
}

impl Texture {
    /// Create the image and copy `desc.data` into it through a staging buffer.
    ///
    /// The texture is left in `SHADER_READ_ONLY_OPTIMAL`.
    pub fn upload(ctx: Arc<GpuContext>, desc: &TextureDesc) -> Result<Self> {
        let expected = desc.width as usize * desc.height as usize * 4;
        if desc.data.len() != expected {
            engine_bail!("flare::vulkan", InvalidResource:
                "Texture data is {} bytes, expected {} for {}x{} RGBA8",
                desc.data.len(), expected, desc.width, desc.height);
        }

        let image = Image::new(
            Arc::clone(&ctx),
            desc.width,
            desc.height,
            COLOR_FORMAT,
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            vk::ImageAspectFlags::COLOR,
            "texture",
        )?;

        let staging = Buffer::with_data(Arc::clone(&ctx), desc.data, vk::BufferUsageFlags::TRANSFER_SRC, "texture staging")?;

        let region = vk::BufferImageCopy::default()
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 });

        ctx.one_shot(|cb| {
            image.record_transition(cb, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
            unsafe {
                ctx.device.cmd_copy_buffer_to_image(
                    cb,
                    staging.buffer,
                    image.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }
            image.record_transition(cb, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        })?;

        Ok(Self { image })
    }
}

impl RendererTexture for Texture {
    fn width(&self) -> u32 {
        self.image.extent.width
    }

    fn height(&self) -> u32 {
        self.image.extent.height
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
