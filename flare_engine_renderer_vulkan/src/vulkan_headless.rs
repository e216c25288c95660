/// Headless target - offscreen RGBA8 image standing in for the swapchain
///
/// The image rests in `TRANSFER_SRC_OPTIMAL` so it can be copied into the
/// host-visible readback buffer once the frame's fence has signaled.

use ash::vk;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::engine_debug;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::COLOR_FORMAT;
use crate::vulkan_image::Image;
use crate::vulkan_render_pass::{create_framebuffer, SurfaceFormat};
use crate::vulkan_surface::SurfaceTargets;

pub const HEADLESS_SURFACE: SurfaceFormat = SurfaceFormat {
    format: COLOR_FORMAT,
    final_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
};

pub struct HeadlessTarget {
    ctx: Arc<GpuContext>,
    render_pass: vk::RenderPass,
    image: Image,
    framebuffer: vk::Framebuffer,
    readback: Buffer,
}

impl HeadlessTarget {
    pub fn new(ctx: Arc<GpuContext>, render_pass: vk::RenderPass, width: u32, height: u32) -> Result<Self> {
        let image = Image::new(
            Arc::clone(&ctx),
            width,
            height,
            COLOR_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST,
            vk::ImageAspectFlags::COLOR,
            "headless target",
        )?;

        // Bring the image to its resting layout so a read before the first frame is valid
        ctx.one_shot(|cb| {
            image.record_transition(cb, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        })?;

        let readback = Buffer::new(
            Arc::clone(&ctx),
            u64::from(width) * u64::from(height) * 4,
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuToCpu,
            "headless readback",
        )?;

        let framebuffer = create_framebuffer(&ctx.device, render_pass, &[image.view], image.extent)?;

        engine_debug!("flare::vulkan", "Headless target created: {}x{}", width, height);
        Ok(Self { ctx, render_pass, image, framebuffer, readback })
    }

    pub fn targets(&self) -> SurfaceTargets {
        SurfaceTargets {
            render_pass: self.render_pass,
            images: vec![self.image.image],
            framebuffers: vec![self.framebuffer],
            extent: self.image.extent,
            resting_layout: HEADLESS_SURFACE.final_layout,
        }
    }

    /// Replace the target with one of the new size. The device must be idle.
    pub fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        *self = Self::new(Arc::clone(&self.ctx), self.render_pass, width, height)?;
        Ok(())
    }

    /// Copy the image into host memory as tightly packed RGBA8
    pub fn read_back(&self) -> Result<Vec<u8>> {
        let extent = self.image.extent;
        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 });

        self.ctx.one_shot(|cb| unsafe {
            self.ctx.device.cmd_copy_image_to_buffer(
                cb,
                self.image.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                self.readback.buffer,
                &[region],
            );
        })?;

        self.readback.read(extent.width as usize * extent.height as usize * 4)
    }
}

impl Drop for HeadlessTarget {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
