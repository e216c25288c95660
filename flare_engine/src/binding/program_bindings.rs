/// Backend binding objects of one program.
///
/// Built once per program the first time a pipeline needs it, then shared
/// by every camera drawing the program. Holds the backend layouts, the
/// pipeline layout description, and the program's static texture set.

use std::sync::Arc;
use parking_lot::Mutex;
use crate::error::Result;
use crate::engine_warn;
use crate::handles::TextureSamplerHandle;
use crate::program::{RenderProgram, ProgramTextures};
use crate::renderer::{
    Renderer, BindingLayout, BindingSet, Sampler, PipelineLayoutDesc,
};
use crate::binding::{BindingLayoutInfo, STATIC_SET_INDEX};

struct StaticSet {
    set: Arc<dyn BindingSet>,
    texture_version: u64,
    resize_epoch: u64,
}

pub struct ProgramBindings {
    info: BindingLayoutInfo,
    static_layout: Option<Arc<dyn BindingLayout>>,
    push_layouts: Vec<Arc<dyn BindingLayout>>,
    layout: PipelineLayoutDesc,
    static_set: Mutex<Option<StaticSet>>,
}

impl ProgramBindings {
    /// Classify the program's inputs and create the backend layouts
    pub fn new(renderer: &dyn Renderer, program: &RenderProgram) -> Result<Self> {
        let info = BindingLayoutInfo::classify(program)?;

        let static_layout = match &info.static_set {
            Some(desc) => Some(renderer.create_binding_layout(desc)?),
            None => None,
        };

        let mut push_layouts = Vec::with_capacity(info.push_bindings.len());
        for push in &info.push_bindings {
            push_layouts.push(renderer.create_binding_layout(&push.desc)?);
        }

        let mut set_layouts = Vec::with_capacity(push_layouts.len() + 1);
        if let Some(layout) = &static_layout {
            set_layouts.push((STATIC_SET_INDEX, Arc::clone(layout)));
        }
        for (push, layout) in info.push_bindings.iter().zip(&push_layouts) {
            set_layouts.push((push.set, Arc::clone(layout)));
        }
        set_layouts.sort_by_key(|(index, _)| *index);

        let layout = PipelineLayoutDesc {
            push_constant: info.push_constant,
            set_layouts,
        };

        Ok(Self {
            info,
            static_layout,
            push_layouts,
            layout,
            static_set: Mutex::new(None),
        })
    }

    pub fn info(&self) -> &BindingLayoutInfo {
        &self.info
    }

    /// Pipeline layout (push constant range + set layouts in set order)
    pub fn layout(&self) -> &PipelineLayoutDesc {
        &self.layout
    }

    /// Backend layouts of the push bindings, in push binding order
    pub fn push_layouts(&self) -> &[Arc<dyn BindingLayout>] {
        &self.push_layouts
    }

    /// The static texture set, rebuilt when the program's textures or any
    /// render texture size changed since it was last written.
    ///
    /// A new set is allocated on every rebuild. Lists that bound the old
    /// one keep it alive until their flight frame is recycled.
    ///
    /// # Arguments
    ///
    /// * `renderer` - Backend allocating the set
    /// * `textures` - Current texture bindings of the program
    /// * `resize_epoch` - Render texture resize counter
    /// * `resolve` - Looks up the backend sampler of a sampler handle
    pub fn static_set(
        &self,
        renderer: &dyn Renderer,
        textures: &ProgramTextures,
        resize_epoch: u64,
        resolve: impl Fn(TextureSamplerHandle) -> Result<Arc<dyn Sampler>>,
    ) -> Result<Option<Arc<dyn BindingSet>>> {
        let Some(layout) = &self.static_layout else {
            return Ok(None);
        };

        let mut cached = self.static_set.lock();
        if let Some(current) = cached.as_ref() {
            if current.texture_version == textures.version && current.resize_epoch == resize_epoch {
                return Ok(Some(Arc::clone(&current.set)));
            }
        }

        let set = renderer.create_binding_set(layout)?;
        for (slot, sampler) in &textures.bindings {
            match resolve(*sampler) {
                Ok(sampler) => set.write_sampler(*slot as u32, &sampler)?,
                Err(_) => engine_warn!("flare::ProgramBindings",
                    "Texture slot {} references missing sampler {}", slot, sampler.raw()),
            }
        }

        *cached = Some(StaticSet {
            set: Arc::clone(&set),
            texture_version: textures.version,
            resize_epoch,
        });
        Ok(Some(set))
    }
}

#[cfg(test)]
#[path = "program_bindings_tests.rs"]
mod tests;
