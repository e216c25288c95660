/// Render-stack batcher.
///
/// Groups mesh instances by material so each camera binds a material's
/// pipeline once and then draws every instance that uses it. Stacks keep
/// creation order, and so do the model groups inside a stack and the
/// transforms inside a group: draw order is deterministic.

use crate::handles::{ProgramHandle, ModelHandle, TransformHandle};
use crate::scene::MeshRenderBuffer;

/// Every instance of one model inside a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelGroup {
    pub model: ModelHandle,
    pub transforms: Vec<TransformHandle>,
}

/// Batch of instances sharing a material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialRenderStack {
    material: ProgramHandle,
    groups: Vec<ModelGroup>,
}

impl MaterialRenderStack {
    fn new(buffer: &MeshRenderBuffer) -> Self {
        Self {
            material: buffer.material,
            groups: vec![ModelGroup { model: buffer.model, transforms: vec![buffer.transform] }],
        }
    }

    pub fn material(&self) -> ProgramHandle {
        self.material
    }

    pub fn groups(&self) -> &[ModelGroup] {
        &self.groups
    }

    /// Total number of instances in the stack
    pub fn instance_count(&self) -> usize {
        self.groups.iter().map(|g| g.transforms.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Add the instance if it uses this stack's material
    fn add(&mut self, buffer: &MeshRenderBuffer) -> bool {
        if buffer.material != self.material {
            return false;
        }

        match self.groups.iter_mut().find(|g| g.model == buffer.model) {
            Some(group) => group.transforms.push(buffer.transform),
            None => self.groups.push(ModelGroup {
                model: buffer.model,
                transforms: vec![buffer.transform],
            }),
        }
        true
    }

    /// Remove one occurrence of the instance; drops its group once empty
    fn remove(&mut self, buffer: &MeshRenderBuffer) -> bool {
        if buffer.material != self.material {
            return false;
        }

        let Some(group_index) = self.groups.iter().position(|g| g.model == buffer.model) else {
            return false;
        };
        let group = &mut self.groups[group_index];
        let Some(index) = group.transforms.iter().position(|t| *t == buffer.transform) else {
            return false;
        };

        group.transforms.remove(index);
        if group.transforms.is_empty() {
            self.groups.remove(group_index);
        }
        true
    }
}

/// Ordered collection of material stacks
#[derive(Debug, Default)]
pub struct RenderStackBatcher {
    stacks: Vec<MaterialRenderStack>,
}

impl RenderStackBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance to the stack of its material, creating the stack
    /// at the end of the collection if none exists
    pub fn add(&mut self, buffer: &MeshRenderBuffer) {
        for stack in &mut self.stacks {
            if stack.add(buffer) {
                return;
            }
        }

        crate::engine_trace!("flare::RenderStackBatcher",
            "New render stack for material {}", buffer.material.raw());
        self.stacks.push(MaterialRenderStack::new(buffer));
    }

    /// Remove an instance. Returns `false` if it was never added.
    ///
    /// A stack left without instances is removed; the remaining stacks
    /// keep their order.
    pub fn remove(&mut self, buffer: &MeshRenderBuffer) -> bool {
        let Some(index) = self.stacks.iter_mut().position(|s| s.remove(buffer)) else {
            return false;
        };

        if self.stacks[index].is_empty() {
            crate::engine_trace!("flare::RenderStackBatcher",
                "Render stack for material {} emptied", buffer.material.raw());
            self.stacks.remove(index);
        }
        true
    }

    /// Drop every stack drawn with `material`, returning how many
    /// instances went with them
    pub fn remove_material(&mut self, material: ProgramHandle) -> usize {
        let mut removed = 0;
        self.stacks.retain(|s| {
            if s.material == material {
                removed += s.instance_count();
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn stacks(&self) -> &[MaterialRenderStack] {
        &self.stacks
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

#[cfg(test)]
#[path = "batcher_tests.rs"]
mod tests;
