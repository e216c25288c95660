/// Textures, samplers and render textures.

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;

/// Texture creation descriptor (RGBA8 pixels)
pub struct TextureDesc<'a> {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels, `width * height * 4` bytes
    pub data: &'a [u8],
}

/// Sampled 2D texture
pub trait Texture: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn as_any(&self) -> &dyn Any;
}

/// Texel filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Out-of-range texture coordinate handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

/// What a sampler reads from
#[derive(Clone)]
pub enum SamplerSource {
    /// A plain texture
    Texture(Arc<dyn Texture>),
    /// One color attachment of a render texture
    RenderTexture {
        target: Arc<dyn RenderTexture>,
        index: u32,
    },
    /// The depth attachment of a render texture
    RenderTextureDepth(Arc<dyn RenderTexture>),
}

/// Sampler creation descriptor
#[derive(Clone)]
pub struct SamplerDesc {
    pub source: SamplerSource,
    pub filter: FilterMode,
    pub address: AddressMode,
}

/// Sampler bound to its source image.
///
/// A sampler over a render texture follows the render texture across
/// resizes: backends resolve the image view when a binding is written.
pub trait Sampler: Send + Sync {
    fn source(&self) -> &SamplerSource;
    fn as_any(&self) -> &dyn Any;
}

/// Render texture creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTextureDesc {
    /// Number of color attachments
    pub count: u32,
    pub width: u32,
    pub height: u32,
    /// Whether a depth attachment is created
    pub depth: bool,
    /// 16-bit float color attachments instead of RGBA8
    pub hdr: bool,
}

/// Offscreen multi-attachment render target
pub trait RenderTexture: Send + Sync {
    /// Number of color attachments
    fn texture_count(&self) -> u32;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn has_depth(&self) -> bool;
    fn is_hdr(&self) -> bool;

    /// Recreate every attachment at the new size
    fn resize(&self, width: u32, height: u32) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
