//! Render programs and the registry that stores them

mod render_program;
mod program_registry;
mod builtin;

pub use render_program::{RenderProgram, ShaderBufferInput, ShaderBufferKind, ProgramFlags};
pub use program_registry::{ProgramRegistry, ProgramTextures};
pub use builtin::{BuiltinProgram, BuiltinShaderSources, LIGHT_TEXTURE_COUNT, POST_TEXTURE_COUNT};
