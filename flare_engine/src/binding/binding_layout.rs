/// Binding layout derivation.
///
/// Splits a program's shader buffer inputs into the three ways a resource
/// reaches a shader:
///
/// - **push constant**: the `Model` input, written into the command list
///   right before each draw
/// - **static set**: `Texture` inputs, gathered in set 0 and written only
///   when the program's textures change
/// - **push bindings**: `Camera`, light and `PushTexture` inputs, one set
///   per input, allocated from a per-flight-frame pool on every push

use crate::error::Result;
use crate::engine_bail;
use crate::program::{RenderProgram, ShaderBufferKind};
use crate::renderer::{
    BindingLayoutDesc, BindingSlotDesc, BindingType, PushConstantRange, ShaderStages,
};

/// Set index of the static texture set
pub const STATIC_SET_INDEX: u32 = 0;

/// How one input of a program is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingCategory {
    PushConstant,
    StaticSet,
    PushBinding,
}

impl BindingCategory {
    pub fn of(kind: ShaderBufferKind) -> Self {
        match kind {
            ShaderBufferKind::Model => BindingCategory::PushConstant,
            ShaderBufferKind::Texture => BindingCategory::StaticSet,
            ShaderBufferKind::Camera
            | ShaderBufferKind::DirectionalLight
            | ShaderBufferKind::PointLight
            | ShaderBufferKind::SpotLight
            | ShaderBufferKind::PushTexture => BindingCategory::PushBinding,
        }
    }
}

fn binding_type(kind: ShaderBufferKind) -> BindingType {
    if kind.is_texture() {
        BindingType::CombinedImageSampler
    } else {
        BindingType::UniformBuffer
    }
}

/// A per-draw binding: one single-entry set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushBinding {
    /// Set index the binding is bound at (also its push slot)
    pub set: u32,
    /// Binding number inside the set
    pub binding: u32,
    pub kind: ShaderBufferKind,
    pub desc: BindingLayoutDesc,
}

/// Classified bindings of one program
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingLayoutInfo {
    pub push_constant: Option<PushConstantRange>,
    /// Layout of set 0, if the program has `Texture` inputs
    pub static_set: Option<BindingLayoutDesc>,
    /// Push bindings in declaration order
    pub push_bindings: Vec<PushBinding>,
}

impl BindingLayoutInfo {
    /// Classify the inputs of `program`.
    ///
    /// # Errors
    ///
    /// `InvalidResource` if a `Texture` input is outside set 0, or if two
    /// push bindings (or a push binding and the static set) share a set.
    pub fn classify(program: &RenderProgram) -> Result<Self> {
        let mut info = BindingLayoutInfo::default();
        let mut static_entries = Vec::new();

        for input in &program.shader_buffer_inputs {
            let stages = if input.stages.is_empty() { ShaderStages::ALL } else { input.stages };

            match BindingCategory::of(input.kind) {
                BindingCategory::PushConstant => {
                    info.push_constant = Some(PushConstantRange {
                        stages,
                        offset: 0,
                        size: input.kind.uniform_size(),
                    });
                }
                BindingCategory::StaticSet => {
                    if input.set as u32 != STATIC_SET_INDEX {
                        engine_bail!("flare::BindingLayoutInfo",
                            InvalidResource: "texture input at slot {} must live in set {}, found set {}",
                            input.slot, STATIC_SET_INDEX, input.set);
                    }
                    static_entries.push(BindingSlotDesc {
                        binding: input.slot as u32,
                        binding_type: binding_type(input.kind),
                        stages,
                        uniform_size: 0,
                    });
                }
                BindingCategory::PushBinding => {
                    let set = input.set as u32;
                    if info.push_bindings.iter().any(|p| p.set == set) {
                        engine_bail!("flare::BindingLayoutInfo",
                            InvalidResource: "two push bindings share set {}", set);
                    }
                    info.push_bindings.push(PushBinding {
                        set,
                        binding: input.slot as u32,
                        kind: input.kind,
                        desc: BindingLayoutDesc {
                            entries: vec![BindingSlotDesc {
                                binding: input.slot as u32,
                                binding_type: binding_type(input.kind),
                                stages,
                                uniform_size: input.kind.uniform_size(),
                            }],
                        },
                    });
                }
            }
        }

        if !static_entries.is_empty() {
            if info.push_bindings.iter().any(|p| p.set == STATIC_SET_INDEX) {
                engine_bail!("flare::BindingLayoutInfo",
                    InvalidResource: "push binding placed in set {} which holds the static textures",
                    STATIC_SET_INDEX);
            }
            info.static_set = Some(BindingLayoutDesc { entries: static_entries });
        }

        Ok(info)
    }

    /// Push binding bound at set `set`
    pub fn push_binding_at(&self, set: u32) -> Option<(usize, &PushBinding)> {
        self.push_bindings.iter().enumerate().find(|(_, p)| p.set == set)
    }

    /// First push binding carrying `kind`
    pub fn push_binding_of(&self, kind: ShaderBufferKind) -> Option<(usize, &PushBinding)> {
        self.push_bindings.iter().enumerate().find(|(_, p)| p.kind == kind)
    }
}

#[cfg(test)]
#[path = "binding_layout_tests.rs"]
mod tests;
