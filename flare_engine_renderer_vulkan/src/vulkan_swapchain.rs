/// Swapchain - window presentation
///
/// Owns the surface, the swapchain images with one view and framebuffer
/// each, and recreates all of them on resize. Semaphores come from the
/// engine, one chain per frame.

use ash::vk;
use std::sync::Arc;
use flare_engine::flare::{Error, Result};
use flare_engine::flare::render::AcquireResult;
use flare_engine::{engine_debug, engine_err, engine_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::subresource_range;
use crate::vulkan_render_pass::{create_framebuffer, SurfaceFormat};
use crate::vulkan_surface::SurfaceTargets;

pub struct Swapchain {
    ctx: Arc<GpuContext>,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    render_pass: vk::RenderPass,
}

impl Swapchain {
    /// Surface format the swapchain will use, BGRA/RGBA sRGB when available
    pub fn choose_format(
        ctx: &GpuContext,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceFormatKHR> {
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(ctx.physical_device, surface)
                .map_err(|e| {
                    engine_error!("flare::vulkan", "Failed to query surface formats: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
                })?
        };

        formats.iter()
            .find(|f| f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB)
            .or_else(|| formats.first())
            .copied()
            .ok_or_else(|| {
                engine_error!("flare::vulkan", "Surface reports no formats");
                Error::InitializationFailed("Surface reports no formats".to_string())
            })
    }

    pub fn surface_format(format: vk::SurfaceFormatKHR) -> SurfaceFormat {
        SurfaceFormat { format: format.format, final_layout: vk::ImageLayout::PRESENT_SRC_KHR }
    }

    pub fn new(
        ctx: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        format: vk::SurfaceFormatKHR,
        render_pass: vk::RenderPass,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);
        let mut swapchain = Self {
            ctx,
            surface,
            surface_loader,
            swapchain_loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            views: Vec::new(),
            framebuffers: Vec::new(),
            format,
            extent: vk::Extent2D { width, height },
            render_pass,
        };
        swapchain.recreate(width, height)?;
        Ok(swapchain)
    }

    pub fn targets(&self) -> SurfaceTargets {
        SurfaceTargets {
            render_pass: self.render_pass,
            images: self.images.clone(),
            framebuffers: self.framebuffers.clone(),
            extent: self.extent,
            resting_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }

    pub fn acquire(&self, signal: vk::Semaphore) -> Result<AcquireResult> {
        let acquired = unsafe {
            self.swapchain_loader.acquire_next_image(self.swapchain, u64::MAX, signal, vk::Fence::null())
        };

        match acquired {
            Ok((index, _suboptimal)) => Ok(AcquireResult::Image(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!("flare::vulkan", "Swapchain out of date during acquire");
                Ok(AcquireResult::OutOfDate)
            }
            Err(e) => Err(engine_err!("flare::vulkan", "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    /// Queue `image_index` for presentation. Returns `false` when the
    /// swapchain no longer matches the surface.
    pub fn present(&self, image_index: u32, wait: vk::Semaphore) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = self.ctx.with_queue(|queue| unsafe {
            self.swapchain_loader.queue_present(queue, &present_info)
        });

        match presented {
            Ok(false) => Ok(true),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(false),
            Err(e) => Err(engine_err!("flare::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }

    /// Rebuild the swapchain, views and framebuffers. The device must be idle.
    pub fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            let capabilities = self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to get surface capabilities: {:?}", e))?;

            let extent = if capabilities.current_extent.width != u32::MAX {
                capabilities.current_extent
            } else {
                vk::Extent2D {
                    width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
                    height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
                }
            };

            let mut image_count = capabilities.min_image_count + 1;
            if capabilities.max_image_count > 0 {
                image_count = image_count.min(capabilities.max_image_count);
            }

            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(image_count)
                .image_format(self.format.format)
                .image_color_space(self.format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(vk::PresentModeKHR::FIFO)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self.swapchain_loader.create_swapchain(&create_info, None)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to create swapchain: {:?}", e))?;

            self.destroy_views();
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;

            self.images = self.swapchain_loader.get_swapchain_images(swapchain)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to get swapchain images: {:?}", e))?;

            for &image in &self.images {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(self.format.format)
                    .subresource_range(subresource_range(vk::ImageAspectFlags::COLOR));

                let view = self.ctx.device.create_image_view(&view_info, None)
                    .map_err(|e| engine_err!("flare::vulkan", "Failed to create swapchain image view: {:?}", e))?;
                self.views.push(view);

                let framebuffer = create_framebuffer(&self.ctx.device, self.render_pass, &[view], extent)?;
                self.framebuffers.push(framebuffer);
            }

            engine_debug!("flare::vulkan", "Swapchain created: {} images, {}x{}",
                self.images.len(), extent.width, extent.height);
            Ok(())
        }
    }

    fn destroy_views(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.ctx.device.destroy_framebuffer(framebuffer, None);
            }
            for view in self.views.drain(..) {
                self.ctx.device.destroy_image_view(view, None);
            }
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_views();
        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
