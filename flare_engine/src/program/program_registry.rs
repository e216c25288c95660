/// Shader Program Registry
///
/// Stores shader modules and render programs in handle tables. The
/// registry is a data store: it checks that a program references live
/// shaders of the right stage and keeps the textures bound to each
/// program, but never derives binding layouts (that happens when a
/// pipeline is built, see `binding::BindingLayoutInfo`).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use rustc_hash::FxHashSet;
use crate::error::Result;
use crate::handles::{ShaderHandle, ProgramHandle, TextureSamplerHandle};
use crate::program::{RenderProgram, ProgramFlags, ShaderBufferKind};
use crate::renderer::{Shader, ShaderStage};
use crate::utils::HandleTable;
use crate::{engine_bail, engine_bail_warn, engine_debug, engine_warn};

struct ProgramEntry {
    program: RenderProgram,
    /// `(binding slot, sampler)` for the program's `Texture` inputs
    textures: Vec<(u16, TextureSamplerHandle)>,
    /// Bumped every time `textures` changes
    texture_version: u64,
}

/// Textures bound to a program, with the version they were read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramTextures {
    pub version: u64,
    pub bindings: Vec<(u16, TextureSamplerHandle)>,
}

pub struct ProgramRegistry {
    shaders: HandleTable<ShaderHandle, Arc<dyn Shader>>,
    programs: HandleTable<ProgramHandle, ProgramEntry>,
    versions: AtomicU64,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self {
            shaders: HandleTable::new(),
            programs: HandleTable::new(),
            versions: AtomicU64::new(1),
        }
    }

    fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::Relaxed)
    }

    // ===== SHADERS =====

    /// Store a compiled shader module
    pub fn add_shader(&self, shader: Arc<dyn Shader>) -> ShaderHandle {
        self.shaders.generate(shader)
    }

    /// Live programs using `shader` as vertex or pixel stage
    fn shader_users(&self, shader: ShaderHandle) -> usize {
        self.programs.count_where(|entry| {
            entry.program.vertex_shader == shader || entry.program.pixel_shader == shader
        })
    }

    /// Destroy a shader module.
    ///
    /// # Errors
    ///
    /// `InvalidResource` while a live program references it; its slot
    /// must not be reused under that program.
    pub fn destroy_shader(&self, handle: ShaderHandle) -> Result<()> {
        let users = self.shader_users(handle);
        if users > 0 {
            engine_bail_warn!("flare::ProgramRegistry",
                InvalidResource: "shader {} is still used by {} program(s)", handle.raw(), users);
        }
        self.shaders.destroy(handle).map(|_| ())
    }

    pub fn shader(&self, handle: ShaderHandle) -> Result<Arc<dyn Shader>> {
        self.shaders.get(handle)
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    // ===== PROGRAMS =====

    fn validate(&self, program: &RenderProgram) -> Result<()> {
        let vertex = self.shaders.get(program.vertex_shader)?;
        if vertex.stage() != ShaderStage::Vertex {
            engine_bail!("flare::ProgramRegistry",
                InvalidResource: "shader {} is not a vertex shader", program.vertex_shader.raw());
        }
        let pixel = self.shaders.get(program.pixel_shader)?;
        if pixel.stage() != ShaderStage::Pixel {
            engine_bail!("flare::ProgramRegistry",
                InvalidResource: "shader {} is not a pixel shader", program.pixel_shader.raw());
        }

        let mut seen = FxHashSet::default();
        let mut model_inputs = 0;
        for input in &program.shader_buffer_inputs {
            if input.kind == ShaderBufferKind::Model {
                model_inputs += 1;
                continue;
            }
            if !seen.insert((input.set, input.slot)) {
                engine_bail!("flare::ProgramRegistry",
                    InvalidResource: "binding (set {}, slot {}) declared twice", input.set, input.slot);
            }
        }
        if model_inputs > 1 {
            engine_bail!("flare::ProgramRegistry",
                InvalidResource: "program declares {} model inputs, at most one allowed", model_inputs);
        }
        Ok(())
    }

    /// Register a program. Its input list is copied into the registry.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` if a shader handle is not live, `InvalidResource` if
    /// a shader has the wrong stage or a binding is declared twice.
    pub fn generate_program(&self, program: RenderProgram) -> Result<ProgramHandle> {
        self.validate(&program)?;
        let handle = self.programs.generate(ProgramEntry {
            program,
            textures: Vec::new(),
            texture_version: self.next_version(),
        });
        engine_debug!("flare::ProgramRegistry", "Program {} registered", handle.raw());
        Ok(handle)
    }

    /// Destroy a program, and its shaders when it carries
    /// [`ProgramFlags::DESTROY_SHADERS`].
    ///
    /// Once the program slot is freed the call succeeds: shaders another
    /// live program still uses are kept, and a shader that is already gone
    /// is only logged.
    pub fn destroy_program(&self, handle: ProgramHandle) -> Result<RenderProgram> {
        let entry = self.programs.destroy(handle)?;
        let program = entry.program;

        if program.flags.contains(ProgramFlags::DESTROY_SHADERS) {
            let mut shaders = vec![program.vertex_shader];
            if program.pixel_shader != program.vertex_shader {
                shaders.push(program.pixel_shader);
            }
            for shader in shaders {
                let users = self.shader_users(shader);
                if users > 0 {
                    engine_debug!("flare::ProgramRegistry",
                        "Shader {} kept, {} other program(s) use it", shader.raw(), users);
                } else if let Err(e) = self.shaders.destroy(shader) {
                    engine_warn!("flare::ProgramRegistry",
                        "Program {} could not destroy shader {}: {}", handle.raw(), shader.raw(), e);
                }
            }
        }
        Ok(program)
    }

    pub fn program(&self, handle: ProgramHandle) -> Result<RenderProgram> {
        self.programs.with(handle, |entry| entry.program.clone())
    }

    /// Replace a live program.
    ///
    /// Returns whether pipeline state changed, in which case cached
    /// pipelines built from the old description must be dropped. Texture
    /// bindings whose slot is no longer a `Texture` input are released.
    pub fn set_program(&self, handle: ProgramHandle, program: RenderProgram) -> Result<bool> {
        self.validate(&program)?;
        let version = self.next_version();

        self.programs.with_mut(handle, |entry| {
            let changed = entry.program.pipeline_state_differs(&program);
            entry.program = program;

            let inputs = &entry.program.shader_buffer_inputs;
            let before = entry.textures.len();
            entry.textures.retain(|(slot, _)| {
                inputs.iter().any(|i| i.kind == ShaderBufferKind::Texture && i.slot == *slot)
            });
            if changed || entry.textures.len() != before {
                entry.texture_version = version;
            }
            changed
        })
    }

    /// Bind `sampler` to the `Texture` input at binding `slot`.
    ///
    /// # Errors
    ///
    /// `BindingNotFound` if the program declares no `Texture` input there.
    pub fn set_texture(&self, handle: ProgramHandle, slot: u16, sampler: TextureSamplerHandle) -> Result<()> {
        let version = self.next_version();
        let found = self.programs.with_mut(handle, |entry| {
            let declared = entry.program.shader_buffer_inputs.iter()
                .any(|i| i.kind == ShaderBufferKind::Texture && i.slot == slot);
            if !declared {
                return false;
            }

            match entry.textures.iter_mut().find(|(s, _)| *s == slot) {
                Some(binding) => binding.1 = sampler,
                None => {
                    entry.textures.push((slot, sampler));
                    entry.textures.sort_by_key(|(s, _)| *s);
                }
            }
            entry.texture_version = version;
            true
        })?;

        if !found {
            engine_bail!("flare::ProgramRegistry",
                BindingNotFound: "program {} has no texture input at slot {}", handle.raw(), slot);
        }
        Ok(())
    }

    pub fn textures(&self, handle: ProgramHandle) -> Result<ProgramTextures> {
        self.programs.with(handle, |entry| ProgramTextures {
            version: entry.texture_version,
            bindings: entry.textures.clone(),
        })
    }

    /// Unbind a destroyed sampler from every program
    pub fn release_sampler(&self, sampler: TextureSamplerHandle) {
        for handle in self.programs.handles() {
            let version = self.next_version();
            // The handle came from the table a moment ago; a concurrent
            // destroy just means there is nothing left to unbind.
            let _ = self.programs.with_mut(handle, |entry| {
                let before = entry.textures.len();
                entry.textures.retain(|(_, s)| *s != sampler);
                if entry.textures.len() != before {
                    entry.texture_version = version;
                }
            });
        }
    }

    pub fn contains(&self, handle: ProgramHandle) -> bool {
        self.programs.contains(handle)
    }

    /// Live programs with their render layer, in handle order
    pub fn render_layers(&self) -> Vec<(ProgramHandle, u32)> {
        self.programs.map_live(|entry| entry.program.render_layer)
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Empty both tables; returns `(programs, shaders)` that were still live
    pub fn clear(&self) -> (usize, usize) {
        (self.programs.drain().len(), self.shaders.drain().len())
    }
}

impl Default for ProgramRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "program_registry_tests.rs"]
mod tests;
