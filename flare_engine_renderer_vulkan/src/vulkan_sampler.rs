/// Sampler - VkSampler plus the image it reads
///
/// The image view is looked up when a binding is written, so a sampler over
/// a render texture keeps working after the render texture is resized.

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::flare::render::{Sampler as RendererSampler, SamplerDesc, SamplerSource};
use flare_engine::engine_err;

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{address_to_vk, downcast, filter_to_vk};
use crate::vulkan_render_texture::RenderTexture;
use crate::vulkan_texture::Texture;

pub struct Sampler {
    ctx: Arc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
    source: SamplerSource,
}

impl Sampler {
    pub fn new(ctx: Arc<GpuContext>, desc: SamplerDesc) -> Result<Self> {
        let filter = filter_to_vk(desc.filter);
        let address = address_to_vk(desc.address);

        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .max_lod(0.0)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK);

        let sampler = unsafe {
            ctx.device.create_sampler(&create_info, None)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to create sampler: {:?}", e))?
        };

        Ok(Self { ctx, sampler, source: desc.source })
    }

    /// View of the source image as it is right now
    pub(crate) fn image_view(&self) -> Result<vk::ImageView> {
        match &self.source {
            SamplerSource::Texture(texture) => {
                Ok(downcast::<Texture>(texture.as_any(), "Texture")?.image.view)
            }
            SamplerSource::RenderTexture { target, index } => {
                downcast::<RenderTexture>(target.as_any(), "RenderTexture")?.color_view(*index)
            }
            SamplerSource::RenderTextureDepth(target) => {
                downcast::<RenderTexture>(target.as_any(), "RenderTexture")?.depth_view()
            }
        }
    }
}

impl RendererSampler for Sampler {
    fn source(&self) -> &SamplerSource {
        &self.source
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}
