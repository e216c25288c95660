/// Handles of the frame's output images, shared with command lists
///
/// Swapchain (or headless) targets are recreated on resize; command lists
/// look the current ones up when a pass over `RenderTargetRef::Swapchain`
/// begins.

use ash::vk;
use flare_engine::flare::Result;
use flare_engine::engine_err;

#[derive(Debug, Clone, Default)]
pub struct SurfaceTargets {
    pub render_pass: vk::RenderPass,
    pub images: Vec<vk::Image>,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub extent: vk::Extent2D,
    /// Layout the images are left in between frames
    pub resting_layout: vk::ImageLayout,
}

impl SurfaceTargets {
    pub fn framebuffer(&self, image_index: u32) -> Result<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
            .ok_or_else(|| engine_err!("flare::vulkan", InvalidResource:
                "Surface image {} out of range (count: {})", image_index, self.framebuffers.len()))
    }

    pub fn image(&self, image_index: u32) -> Result<vk::Image> {
        self.images.get(image_index as usize).copied()
            .ok_or_else(|| engine_err!("flare::vulkan", InvalidResource:
                "Surface image {} out of range (count: {})", image_index, self.images.len()))
    }
}
