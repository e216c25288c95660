/// Handle tables of every host-created object that is not a program or a
/// shader.
///
/// The tables are shared read-only with the per-camera worker threads
/// during a frame; every table carries its own lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use crate::error::Result;
use crate::handles::{
    ModelHandle, TextureHandle, TextureSamplerHandle, RenderTextureHandle,
    CameraHandle, DirectionalLightHandle, PointLightHandle, SpotLightHandle, MeshRenderHandle,
};
use crate::renderer::{Model, Texture, Sampler, RenderTexture, TargetLayout};
use crate::scene::{
    CameraBuffer, DirectionalLightBuffer, PointLightBuffer, SpotLightBuffer, MeshRenderBuffer,
};
use crate::utils::HandleTable;

pub struct ResourceTables {
    pub models: HandleTable<ModelHandle, Arc<dyn Model>>,
    pub textures: HandleTable<TextureHandle, Arc<dyn Texture>>,
    pub samplers: HandleTable<TextureSamplerHandle, Arc<dyn Sampler>>,
    pub render_textures: HandleTable<RenderTextureHandle, Arc<dyn RenderTexture>>,
    pub cameras: HandleTable<CameraHandle, CameraBuffer>,
    pub directional_lights: HandleTable<DirectionalLightHandle, DirectionalLightBuffer>,
    pub point_lights: HandleTable<PointLightHandle, PointLightBuffer>,
    pub spot_lights: HandleTable<SpotLightHandle, SpotLightBuffer>,
    pub mesh_renders: HandleTable<MeshRenderHandle, MeshRenderBuffer>,
    /// Bumped on every render texture resize
    resize_epoch: AtomicU64,
}

impl ResourceTables {
    pub fn new() -> Self {
        Self {
            models: HandleTable::new(),
            textures: HandleTable::new(),
            samplers: HandleTable::new(),
            render_textures: HandleTable::new(),
            cameras: HandleTable::new(),
            directional_lights: HandleTable::new(),
            point_lights: HandleTable::new(),
            spot_lights: HandleTable::new(),
            mesh_renders: HandleTable::new(),
            resize_epoch: AtomicU64::new(0),
        }
    }

    /// Render texture resize counter.
    ///
    /// Static sets sampling a render texture are rewritten once this
    /// changes, since the attachments behind the sampler were recreated.
    pub fn resize_epoch(&self) -> u64 {
        self.resize_epoch.load(Ordering::Acquire)
    }

    pub fn bump_resize_epoch(&self) {
        self.resize_epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Target layout of a render texture
    pub fn render_texture_layout(&self, handle: RenderTextureHandle) -> Result<TargetLayout> {
        self.render_textures.with(handle, |rt| TargetLayout::Texture {
            color_count: rt.texture_count(),
            depth: rt.has_depth(),
            hdr: rt.is_hdr(),
        })
    }

    /// Target layout a camera draws into by default
    pub fn camera_target_layout(&self, camera: &CameraBuffer) -> Result<TargetLayout> {
        match camera.render_texture {
            Some(handle) => self.render_texture_layout(handle),
            None => Ok(TargetLayout::Swapchain),
        }
    }

    /// Live entries per table, for leak reports at teardown
    pub fn live_counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("model", self.models.len()),
            ("texture", self.textures.len()),
            ("texture sampler", self.samplers.len()),
            ("render texture", self.render_textures.len()),
            ("camera", self.cameras.len()),
            ("directional light", self.directional_lights.len()),
            ("point light", self.point_lights.len()),
            ("spot light", self.spot_lights.len()),
            ("mesh render buffer", self.mesh_renders.len()),
        ]
    }

    /// Drop every entry (backend objects are released with their last Arc)
    pub fn clear(&self) {
        self.mesh_renders.drain();
        self.cameras.drain();
        self.directional_lights.drain();
        self.point_lights.drain();
        self.spot_lights.drain();
        self.samplers.drain();
        self.render_textures.drain();
        self.textures.drain();
        self.models.drain();
    }
}

impl Default for ResourceTables {
    fn default() -> Self {
        Self::new()
    }
}
