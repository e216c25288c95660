/// Shader - SPIR-V module plus the resources it declares
///
/// Modules are reflected with spirq when created. The entry point must
/// exist, and the declared descriptors are checked against the pipeline
/// layout when a pipeline is built.

use ash::vk;
use std::any::Any;
use std::ffi::CString;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::flare::render::{
    BindingType, PipelineLayoutDesc, Shader as RendererShader, ShaderDesc, ShaderStage,
};
use flare_engine::{engine_bail, engine_err, engine_warn};

use crate::vulkan_context::GpuContext;

/// One descriptor declared by the shader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub set: u32,
    pub binding: u32,
    /// `None` for descriptor kinds the engine never binds
    pub binding_type: Option<BindingType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    pub bindings: Vec<ReflectedBinding>,
    pub push_constant_size: Option<u32>,
}

impl ShaderReflection {
    /// Warn about declared resources `layout` does not provide
    pub fn check_layout(&self, stage: ShaderStage, layout: &PipelineLayoutDesc) {
        for reflected in &self.bindings {
            let slot = layout.set_layouts.iter()
                .find(|(set, _)| *set == reflected.set)
                .and_then(|(_, set_layout)| {
                    set_layout.desc().entries.iter().find(|entry| entry.binding == reflected.binding)
                });

            match slot {
                None => engine_warn!("flare::vulkan",
                    "{:?} shader reads set {} binding {} which the program does not declare",
                    stage, reflected.set, reflected.binding),
                Some(entry) if reflected.binding_type.is_some_and(|ty| ty != entry.binding_type) => {
                    engine_warn!("flare::vulkan",
                        "{:?} shader declares set {} binding {} as {:?}, program declares {:?}",
                        stage, reflected.set, reflected.binding, reflected.binding_type, entry.binding_type);
                }
                Some(_) => {}
            }
        }

        if let Some(size) = self.push_constant_size {
            let declared = layout.push_constant.map(|range| range.offset + range.size).unwrap_or(0);
            if size > declared {
                engine_warn!("flare::vulkan",
                    "{:?} shader uses {} push-constant bytes, program declares {}", stage, size, declared);
            }
        }
    }
}

fn reflect(code: &[u32], entry_point: &str) -> Result<ShaderReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("flare::vulkan", InvalidResource: "SPIR-V reflection failed: {:?}", e))?;

    let Some(entry) = entry_points.iter().find(|ep| ep.name == entry_point) else {
        let names: Vec<&str> = entry_points.iter().map(|ep| ep.name.as_str()).collect();
        engine_bail!("flare::vulkan", InvalidResource:
            "Entry point '{}' not found in shader (available: {:?})", entry_point, names);
    };

    let mut reflection = ShaderReflection::default();
    for var in entry.vars.iter() {
        match var {
            spirq::var::Variable::Descriptor { desc_bind, desc_ty, .. } => {
                use spirq::ty::DescriptorType;
                let binding_type = match desc_ty {
                    DescriptorType::UniformBuffer() => Some(BindingType::UniformBuffer),
                    DescriptorType::CombinedImageSampler() => Some(BindingType::CombinedImageSampler),
                    _ => None,
                };
                reflection.bindings.push(ReflectedBinding {
                    set: desc_bind.set(),
                    binding: desc_bind.bind(),
                    binding_type,
                });
            }
            spirq::var::Variable::PushConstant { ty, .. } => {
                reflection.push_constant_size = ty.nbyte().map(|size| size as u32);
            }
            _ => {}
        }
    }

    Ok(reflection)
}

pub struct Shader {
    ctx: Arc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
    stage: ShaderStage,
    pub(crate) entry_point: CString,
    pub(crate) reflection: ShaderReflection,
}

impl Shader {
    pub fn new(ctx: Arc<GpuContext>, desc: &ShaderDesc) -> Result<Self> {
        if desc.code.is_empty() {
            engine_bail!("flare::vulkan", InvalidResource: "Shader code is empty");
        }

        let reflection = reflect(desc.code, desc.entry_point)?;
        let entry_point = CString::new(desc.entry_point)
            .map_err(|_| engine_err!("flare::vulkan", InvalidResource: "Entry point contains a NUL byte"))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(desc.code);
        let module = unsafe {
            ctx.device.create_shader_module(&create_info, None)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to create shader module: {:?}", e))?
        };

        Ok(Self { ctx, module, stage: desc.stage, entry_point, reflection })
    }
}

impl RendererShader for Shader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}
