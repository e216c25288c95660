/// Light buffers and the uniform blocks built from them.
///
/// Lights follow the camera convention: a light is placed by a transform
/// handle, filtered by a render-layer mask, and turned into a shader block
/// each frame from the transform's world matrix.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use crate::handles::TransformHandle;

/// The three light passes, drawn in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

impl LightKind {
    pub const ALL: [LightKind; 3] = [LightKind::Directional, LightKind::Point, LightKind::Spot];
}

// ===== HOST-SIDE BUFFERS =====

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLightBuffer {
    pub transform: TransformHandle,
    pub render_layer: u32,
    pub color: Vec4,
    pub intensity: f32,
}

impl DirectionalLightBuffer {
    pub fn new(transform: TransformHandle) -> Self {
        Self { transform, render_layer: 0b1, color: Vec4::ONE, intensity: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightBuffer {
    pub transform: TransformHandle,
    pub render_layer: u32,
    pub color: Vec4,
    pub intensity: f32,
    pub radius: f32,
}

impl PointLightBuffer {
    pub fn new(transform: TransformHandle) -> Self {
        Self { transform, render_layer: 0b1, color: Vec4::ONE, intensity: 1.0, radius: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLightBuffer {
    pub transform: TransformHandle,
    pub render_layer: u32,
    pub color: Vec4,
    pub intensity: f32,
    pub radius: f32,
    /// Full-intensity cone half angle in radians
    pub inner_cutoff: f32,
    /// Falloff cone half angle in radians
    pub outer_cutoff: f32,
}

impl SpotLightBuffer {
    pub fn new(transform: TransformHandle) -> Self {
        Self {
            transform,
            render_layer: 0b1,
            color: Vec4::ONE,
            intensity: 1.0,
            radius: 1.0,
            inner_cutoff: std::f32::consts::FRAC_PI_8,
            outer_cutoff: std::f32::consts::FRAC_PI_6,
        }
    }
}

// ===== SHADER BLOCKS =====

/// Forward axis of a world matrix (-Z), normalized
fn forward(world: Mat4) -> Vec4 {
    (-world.z_axis.truncate()).normalize_or_zero().extend(0.0)
}

fn premultiplied(color: Vec4, intensity: f32) -> Vec4 {
    Vec4::new(color.x, color.y, color.z, color.w * intensity)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DirectionalLightShaderBuffer {
    pub light_dir: Vec4,
    /// `w` carries the intensity
    pub color: Vec4,
}

impl DirectionalLightShaderBuffer {
    pub fn new(light: &DirectionalLightBuffer, world: Mat4) -> Self {
        Self {
            light_dir: forward(world),
            color: premultiplied(light.color, light.intensity),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLightShaderBuffer {
    pub light_pos: Vec4,
    pub color: Vec4,
    pub radius: f32,
    _pad: [f32; 3],
}

impl PointLightShaderBuffer {
    pub fn new(light: &PointLightBuffer, world: Mat4) -> Self {
        Self {
            light_pos: world.w_axis.truncate().extend(1.0),
            color: premultiplied(light.color, light.intensity),
            radius: light.radius,
            _pad: [0.0; 3],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpotLightShaderBuffer {
    pub light_pos: Vec4,
    /// Direction in `xyz`, inner cutoff cosine in `w`
    pub light_dir_angle: Vec4,
    pub color: Vec4,
    pub radius: f32,
    /// Cosine of the outer cutoff angle
    pub outer_cutoff: f32,
    _pad: [f32; 2],
}

impl SpotLightShaderBuffer {
    pub fn new(light: &SpotLightBuffer, world: Mat4) -> Self {
        let dir = forward(world);
        Self {
            light_pos: world.w_axis.truncate().extend(1.0),
            light_dir_angle: Vec4::new(dir.x, dir.y, dir.z, light.inner_cutoff.cos()),
            color: premultiplied(light.color, light.intensity),
            radius: light.radius,
            outer_cutoff: light.outer_cutoff.cos(),
            _pad: [0.0; 2],
        }
    }
}

#[cfg(test)]
#[path = "light_tests.rs"]
mod tests;
