/// Camera buffer - per-camera view parameters stored in a handle table.
///
/// A camera holds no matrices of its own. Its view comes from the world
/// matrix of its transform (resolved through the host's transform graph)
/// and its projection is rebuilt from `fov`/`near`/`far` and the size of
/// the target it renders into.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use crate::handles::{TransformHandle, RenderTextureHandle};
use crate::renderer::{Viewport, Rect2D};

/// Normalized viewport of a camera inside its render target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraViewport {
    /// Top-left corner in `[0, 1]` target space
    pub position: Vec2,
    /// Extent in `[0, 1]` target space
    pub size: Vec2,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for CameraViewport {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            size: Vec2::ONE,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

impl CameraViewport {
    /// Viewport scaled to a target of `width` x `height` pixels
    pub fn to_viewport(&self, width: u32, height: u32) -> Viewport {
        let target = Vec2::new(width as f32, height as f32);
        let position = self.position * target;
        let size = self.size * target;
        Viewport {
            x: position.x,
            y: position.y,
            width: size.x,
            height: size.y,
            min_depth: self.min_depth,
            max_depth: self.max_depth,
        }
    }

    /// Scissor covering the scaled viewport
    pub fn to_scissor(&self, width: u32, height: u32) -> Rect2D {
        let viewport = self.to_viewport(width, height);
        Rect2D {
            x: viewport.x as i32,
            y: viewport.y as i32,
            width: viewport.width.max(0.0) as u32,
            height: viewport.height.max(0.0) as u32,
        }
    }
}

/// A camera's view parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBuffer {
    /// Transform whose world matrix places the camera
    pub transform: TransformHandle,
    pub viewport: CameraViewport,
    /// Programs and lights are drawn only when their layer mask intersects this one
    pub render_layer: u32,
    /// Vertical field of view in radians
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Offscreen target; `None` renders to the swapchain
    pub render_texture: Option<RenderTextureHandle>,
}

impl CameraBuffer {
    /// Camera on `transform` with a full viewport on layer 0
    pub fn new(transform: TransformHandle) -> Self {
        Self {
            transform,
            viewport: CameraViewport::default(),
            render_layer: 0b1,
            fov: std::f32::consts::PI * 0.45,
            near: 0.1,
            far: 100.0,
            render_texture: None,
        }
    }

    /// Perspective projection for a screen of `screen_size` pixels.
    ///
    /// Right-handed, `[0, 1]` depth, Y flipped for Vulkan clip space.
    pub fn projection(&self, screen_size: Vec2) -> Mat4 {
        let aspect = if screen_size.y > 0.0 { screen_size.x / screen_size.y } else { 1.0 };
        let mut proj = Mat4::perspective_rh(self.fov, aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    /// Pixel size of the viewport inside a `width` x `height` target
    pub fn viewport_size(&self, width: u32, height: u32) -> Vec2 {
        self.viewport.size * Vec2::new(width as f32, height as f32)
    }
}

/// Map a normalized screen position back into world space.
///
/// # Arguments
///
/// * `camera` - Camera parameters
/// * `world` - World matrix of the camera transform (the inverse view)
/// * `screen` - `xy` in `[0, 1]`, `z` the depth in `[0, 1]`
/// * `screen_size` - Pixel size used for the projection aspect
pub fn screen_to_world(camera: &CameraBuffer, world: Mat4, screen: Vec3, screen_size: Vec2) -> Vec3 {
    let inv_proj = camera.projection(screen_size).inverse();
    let clip = Vec4::new(screen.x * 2.0 - 1.0, screen.y * 2.0 - 1.0, screen.z, 1.0);
    let world_pos = world * (inv_proj * clip);
    world_pos.truncate() / world_pos.w
}

/// Project a world position onto the normalized screen.
///
/// Inverse of [`screen_to_world`]: returns `xy` in `[0, 1]` and the
/// clip-space depth in `z`.
pub fn world_to_screen(camera: &CameraBuffer, world: Mat4, position: Vec3, screen_size: Vec2) -> Vec3 {
    let view_proj = camera.projection(screen_size) * world.inverse();
    let clip = view_proj * position.extend(1.0);
    let ndc = clip.truncate() / clip.w;
    Vec3::new((ndc.x + 1.0) * 0.5, (ndc.y + 1.0) * 0.5, ndc.z)
}

/// Camera uniform block as seen by shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraShaderBuffer {
    pub view: Mat4,
    pub proj: Mat4,
    pub inv_view: Mat4,
    pub inv_proj: Mat4,
    pub view_proj: Mat4,
}

impl CameraShaderBuffer {
    /// Build the uniform block for a camera rendering at `screen_size`
    pub fn new(camera: &CameraBuffer, world: Mat4, screen_size: Vec2) -> Self {
        let proj = camera.projection(screen_size);
        let view = world.inverse();
        Self {
            view,
            proj,
            inv_view: world,
            inv_proj: proj.inverse(),
            view_proj: proj * view,
        }
    }
}

/// Per-draw model block pushed as a push constant
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelShaderBuffer {
    pub model: Mat4,
    pub inv_model: Mat4,
}

impl ModelShaderBuffer {
    pub fn new(model: Mat4) -> Self {
        Self { model, inv_model: model.inverse() }
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
