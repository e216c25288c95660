/// Built-in full-screen programs: the three deferred light passes and the
/// post-process pass.
///
/// They all draw a 4-vertex triangle strip with no vertex buffer, read the
/// geometry buffer through static textures, and own their shaders.

use crate::handles::ShaderHandle;
use crate::program::{RenderProgram, ProgramFlags, ShaderBufferInput, ShaderBufferKind};
use crate::renderer::{CullingMode, PrimitiveMode, ShaderStages};
use crate::scene::LightKind;

/// Geometry-buffer textures read by each light pass
pub const LIGHT_TEXTURE_COUNT: u16 = 5;
/// Textures read by the post-process pass
pub const POST_TEXTURE_COUNT: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinProgram {
    DirectionalLight,
    PointLight,
    SpotLight,
    Post,
}

impl BuiltinProgram {
    pub const ALL: [BuiltinProgram; 4] = [
        BuiltinProgram::DirectionalLight,
        BuiltinProgram::PointLight,
        BuiltinProgram::SpotLight,
        BuiltinProgram::Post,
    ];

    /// Light pass drawing lights of `kind`
    pub fn for_light(kind: LightKind) -> Self {
        match kind {
            LightKind::Directional => BuiltinProgram::DirectionalLight,
            LightKind::Point => BuiltinProgram::PointLight,
            LightKind::Spot => BuiltinProgram::SpotLight,
        }
    }

    /// Program description using the given quad vertex and pass pixel shaders
    pub fn describe(self, vertex_shader: ShaderHandle, pixel_shader: ShaderHandle) -> RenderProgram {
        let mut program = RenderProgram::new(vertex_shader, pixel_shader);
        program.culling_mode = CullingMode::None;
        program.primitive_mode = PrimitiveMode::TriangleStrip;
        program.enable_color_blending = true;
        program.flags = ProgramFlags::DESTROY_SHADERS;

        let light = match self {
            BuiltinProgram::DirectionalLight => Some(ShaderBufferKind::DirectionalLight),
            BuiltinProgram::PointLight => Some(ShaderBufferKind::PointLight),
            BuiltinProgram::SpotLight => Some(ShaderBufferKind::SpotLight),
            BuiltinProgram::Post => None,
        };

        let inputs = &mut program.shader_buffer_inputs;
        match light {
            Some(kind) => {
                for slot in 0..LIGHT_TEXTURE_COUNT {
                    inputs.push(ShaderBufferInput::new(slot, ShaderBufferKind::Texture, ShaderStages::PIXEL));
                }
                inputs.push(ShaderBufferInput::new(LIGHT_TEXTURE_COUNT, kind, ShaderStages::PIXEL).in_set(1));
                inputs.push(
                    ShaderBufferInput::new(LIGHT_TEXTURE_COUNT + 1, ShaderBufferKind::Camera, ShaderStages::PIXEL)
                        .in_set(2),
                );
            }
            None => {
                for slot in 0..POST_TEXTURE_COUNT {
                    inputs.push(ShaderBufferInput::new(slot, ShaderBufferKind::Texture, ShaderStages::PIXEL));
                }
                inputs.push(
                    ShaderBufferInput::new(POST_TEXTURE_COUNT, ShaderBufferKind::Camera, ShaderStages::PIXEL)
                        .in_set(1),
                );
            }
        }
        program
    }
}

/// Shader sources for the built-in programs, compiled by the host's
/// [`ShaderCompiler`](crate::flare::renderer::ShaderCompiler)
#[derive(Debug, Clone, Copy)]
pub struct BuiltinShaderSources<'a> {
    /// Full-screen quad vertex shader shared by every pass
    pub quad_vertex: &'a str,
    pub directional_light: &'a str,
    pub point_light: &'a str,
    pub spot_light: &'a str,
    pub post: &'a str,
}

impl<'a> BuiltinShaderSources<'a> {
    pub fn pixel_source(&self, program: BuiltinProgram) -> &'a str {
        match program {
            BuiltinProgram::DirectionalLight => self.directional_light,
            BuiltinProgram::PointLight => self.point_light,
            BuiltinProgram::SpotLight => self.spot_light,
            BuiltinProgram::Post => self.post,
        }
    }
}

#[cfg(test)]
#[path = "builtin_tests.rs"]
mod tests;
