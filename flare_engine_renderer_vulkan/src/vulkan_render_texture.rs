/// RenderTexture - offscreen color attachments, optional depth, framebuffer

use ash::vk;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::flare::render::{RenderTexture as RendererRenderTexture, RenderTextureDesc};
use flare_engine::{engine_bail, engine_debug, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{color_format, DEPTH_FORMAT};
use crate::vulkan_image::Image;
use crate::vulkan_render_pass::create_framebuffer;

struct Attachments {
    ctx: Arc<GpuContext>,
    colors: Vec<Image>,
    depth: Option<Image>,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
}

impl Attachments {
    fn create(
        ctx: &Arc<GpuContext>,
        desc: &RenderTextureDesc,
        render_pass: vk::RenderPass,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let colors = (0..desc.count)
            .map(|_| Image::new(
                Arc::clone(ctx),
                width,
                height,
                color_format(desc.hdr),
                vk::ImageUsageFlags::COLOR_ATTACHMENT
                    | vk::ImageUsageFlags::SAMPLED
                    | vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST,
                vk::ImageAspectFlags::COLOR,
                "render texture color",
            ))
            .collect::<Result<Vec<_>>>()?;

        let depth = if desc.depth {
            Some(Image::new(
                Arc::clone(ctx),
                width,
                height,
                DEPTH_FORMAT,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                vk::ImageAspectFlags::DEPTH,
                "render texture depth",
            )?)
        } else {
            None
        };

        // Sampling or blitting before the first pass sees a defined layout
        ctx.one_shot(|cb| {
            for image in colors.iter().chain(depth.iter()) {
                image.record_transition(cb, vk::ImageLayout::UNDEFINED, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            }
        })?;

        let views: Vec<vk::ImageView> = colors.iter()
            .chain(depth.iter())
            .map(|image| image.view)
            .collect();
        let extent = vk::Extent2D { width, height };
        let framebuffer = create_framebuffer(&ctx.device, render_pass, &views, extent)?;

        Ok(Self { ctx: Arc::clone(ctx), colors, depth, framebuffer, extent })
    }
}

impl Drop for Attachments {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

pub struct RenderTexture {
    ctx: Arc<GpuContext>,
    desc: RenderTextureDesc,
    render_pass: vk::RenderPass,
    attachments: RwLock<Attachments>,
}

impl RenderTexture {
    /// `render_pass` must be the pass for this texture's target layout
    pub fn new(ctx: Arc<GpuContext>, desc: RenderTextureDesc, render_pass: vk::RenderPass) -> Result<Self> {
        if desc.count == 0 && !desc.depth {
            engine_bail!("flare::vulkan", InvalidResource: "Render texture needs at least one attachment");
        }
        let attachments = Attachments::create(&ctx, &desc, render_pass, desc.width, desc.height)?;
        Ok(Self { ctx, desc, render_pass, attachments: RwLock::new(attachments) })
    }

    pub(crate) fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub(crate) fn framebuffer(&self) -> (vk::Framebuffer, vk::Extent2D) {
        let attachments = self.attachments.read();
        (attachments.framebuffer, attachments.extent)
    }

    /// Number of clear values a pass over this texture takes
    pub(crate) fn attachment_count(&self) -> usize {
        self.desc.count as usize + usize::from(self.desc.depth)
    }

    pub(crate) fn color_view(&self, index: u32) -> Result<vk::ImageView> {
        self.attachments.read().colors.get(index as usize)
            .map(|image| image.view)
            .ok_or_else(|| engine_err!("flare::vulkan", InvalidResource:
                "Render texture has no color attachment {} (count: {})", index, self.desc.count))
    }

    pub(crate) fn depth_view(&self) -> Result<vk::ImageView> {
        self.attachments.read().depth.as_ref()
            .map(|image| image.view)
            .ok_or_else(|| engine_err!("flare::vulkan", InvalidResource: "Render texture has no depth attachment"))
    }

    /// First color image and its extent, for blits
    pub(crate) fn blit_source(&self) -> Result<(vk::Image, vk::Extent2D)> {
        let attachments = self.attachments.read();
        attachments.colors.first()
            .map(|image| (image.image, attachments.extent))
            .ok_or_else(|| engine_err!("flare::vulkan", InvalidResource: "Render texture has no color attachment to blit"))
    }
}

impl RendererRenderTexture for RenderTexture {
    fn texture_count(&self) -> u32 {
        self.desc.count
    }

    fn width(&self) -> u32 {
        self.attachments.read().extent.width
    }

    fn height(&self) -> u32 {
        self.attachments.read().extent.height
    }

    fn has_depth(&self) -> bool {
        self.desc.depth
    }

    fn is_hdr(&self) -> bool {
        self.desc.hdr
    }

    fn resize(&self, width: u32, height: u32) -> Result<()> {
        let mut attachments = self.attachments.write();
        if attachments.extent.width == width && attachments.extent.height == height {
            return Ok(());
        }

        // The old attachments are dropped after the new ones exist
        let resized = Attachments::create(&self.ctx, &self.desc, self.render_pass, width, height)?;
        *attachments = resized;

        engine_debug!("flare::vulkan", "Render texture resized to {}x{}", width, height);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
