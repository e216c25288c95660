/// Render passes per target layout
///
/// Every pass clears its attachments on load. Render texture attachments end
/// in `SHADER_READ_ONLY_OPTIMAL` so later cameras can sample them; the
/// swapchain color attachment ends in the surface's resting layout.

use ash::vk;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::flare::render::TargetLayout;
use flare_engine::{engine_debug, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{color_format, DEPTH_FORMAT};

/// Format and final layout of the presentation surface image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub format: vk::Format,
    pub final_layout: vk::ImageLayout,
}

pub struct RenderPassCache {
    ctx: Arc<GpuContext>,
    surface: SurfaceFormat,
    passes: Mutex<FxHashMap<TargetLayout, vk::RenderPass>>,
}

impl RenderPassCache {
    pub fn new(ctx: Arc<GpuContext>, surface: SurfaceFormat) -> Self {
        Self {
            ctx,
            surface,
            passes: Mutex::new(FxHashMap::default()),
        }
    }

    /// Render pass compatible with `layout`, created on first use
    pub fn get(&self, layout: TargetLayout) -> Result<vk::RenderPass> {
        let mut passes = self.passes.lock();
        if let Some(&pass) = passes.get(&layout) {
            return Ok(pass);
        }

        let pass = match layout {
            TargetLayout::Swapchain => {
                create_render_pass(&self.ctx.device, &[self.surface.format], None, self.surface.final_layout)?
            }
            TargetLayout::Texture { color_count, depth, hdr } => {
                let colors = vec![color_format(hdr); color_count as usize];
                create_render_pass(
                    &self.ctx.device,
                    &colors,
                    depth.then_some(DEPTH_FORMAT),
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                )?
            }
        };

        engine_debug!("flare::vulkan", "Created render pass for {:?}", layout);
        passes.insert(layout, pass);
        Ok(pass)
    }
}

impl Drop for RenderPassCache {
    fn drop(&mut self) {
        unsafe {
            for (_, pass) in self.passes.get_mut().drain() {
                self.ctx.device.destroy_render_pass(pass, None);
            }
        }
    }
}

/// Create a single-subpass render pass clearing every attachment
pub fn create_render_pass(
    device: &ash::Device,
    colors: &[vk::Format],
    depth: Option<vk::Format>,
    final_color_layout: vk::ImageLayout,
) -> Result<vk::RenderPass> {
    let mut attachments: Vec<vk::AttachmentDescription> = colors
        .iter()
        .map(|&format| {
            vk::AttachmentDescription::default()
                .format(format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(final_color_layout)
        })
        .collect();

    let color_refs: Vec<vk::AttachmentReference> = (0..colors.len() as u32)
        .map(|attachment| vk::AttachmentReference {
            attachment,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        })
        .collect();

    let depth_ref = depth.map(|format| {
        attachments.push(
            vk::AttachmentDescription::default()
                .format(format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        );
        vk::AttachmentReference {
            attachment: colors.len() as u32,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        }
    });

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if let Some(depth_ref) = depth_ref.as_ref() {
        subpass = subpass.depth_stencil_attachment(depth_ref);
    }

    let attachment_stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    let attachment_writes = vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;

    let dependencies = [
        // Earlier reads (sampling, blits) finish before the attachments are cleared
        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(attachment_stages | vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::TRANSFER)
            .dst_stage_mask(attachment_stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(attachment_writes),
        // Attachment writes are visible to later sampling and blits
        vk::SubpassDependency::default()
            .src_subpass(0)
            .dst_subpass(vk::SUBPASS_EXTERNAL)
            .src_stage_mask(attachment_stages)
            .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::TRANSFER)
            .src_access_mask(attachment_writes)
            .dst_access_mask(vk::AccessFlags::SHADER_READ | vk::AccessFlags::TRANSFER_READ | vk::AccessFlags::TRANSFER_WRITE),
    ];

    let subpasses = [subpass];
    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe {
        device.create_render_pass(&create_info, None)
            .map_err(|e| engine_err!("flare::vulkan", "Failed to create render pass: {:?}", e))
    }
}

/// Create a framebuffer over `views` for `render_pass`
pub fn create_framebuffer(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> Result<vk::Framebuffer> {
    let create_info = vk::FramebufferCreateInfo::default()
        .render_pass(render_pass)
        .attachments(views)
        .width(extent.width)
        .height(extent.height)
        .layers(1);

    unsafe {
        device.create_framebuffer(&create_info, None)
            .map_err(|e| engine_err!("flare::vulkan", "Failed to create framebuffer: {:?}", e))
    }
}
