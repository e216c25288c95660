/// Per-camera command recorder.
///
/// One `RenderCommands` exists per camera per frame, on the worker thread
/// building that camera's command list. The engine drives it through the
/// render stacks and light passes; host hooks drive it through the same
/// draw-time API (`bind_render_target`, `bind_material`, `push_texture`,
/// `blit`, `draw_model`, `draw_material`).

use std::sync::Arc;
use glam::Mat4;
use crate::error::Result;
use crate::{engine_bail, engine_error};
use crate::binding::STATIC_SET_INDEX;
use crate::context::ResourceTables;
use crate::handles::{CameraHandle, ModelHandle, ProgramHandle, RenderTextureHandle, TextureSamplerHandle};
use crate::pipeline::{CachedPipeline, PipelineCache};
use crate::program::{ProgramRegistry, ShaderBufferKind};
use crate::renderer::{
    Renderer, CommandList, RenderTargetRef, ClearValue, Pipeline, TargetLayout,
};
use crate::scene::{
    CameraBuffer, CameraShaderBuffer, ModelShaderBuffer, MaterialRenderStack, TransformResolver,
};

/// Destination of a render pass or blit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The image presented this frame (the offscreen image when headless)
    Swapchain,
    Texture(RenderTextureHandle),
}

/// Shared, read-only state every camera build borrows
pub struct FrameResources<'a> {
    pub renderer: &'a dyn Renderer,
    pub registry: &'a ProgramRegistry,
    pub pipelines: &'a PipelineCache,
    pub tables: &'a ResourceTables,
    pub transforms: &'a dyn TransformResolver,
}

/// Per-frame indices and parameters handed to every camera build
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Frames submitted before this one
    pub frame: u64,
    /// Render attempt token; push pools reset once per attempt
    pub attempt: u64,
    /// Slot of the command lists and push pools
    pub flight_frame: usize,
    pub image_index: u32,
    pub surface_size: (u32, u32),
    pub clear_color: [f32; 4],
}

struct BoundTarget {
    target: RenderTarget,
    target_ref: RenderTargetRef,
    layout: TargetLayout,
    width: u32,
    height: u32,
}

struct BoundMaterial {
    handle: ProgramHandle,
    entry: Arc<CachedPipeline>,
    pipeline: Arc<dyn Pipeline>,
}

pub struct RenderCommands<'a> {
    res: &'a FrameResources<'a>,
    info: FrameInfo,
    camera: CameraHandle,
    camera_buffer: CameraBuffer,
    camera_world: Mat4,
    list: Box<dyn CommandList>,
    target: Option<BoundTarget>,
    in_pass: bool,
    material: Option<BoundMaterial>,
    draw_count: u32,
}

impl<'a> RenderCommands<'a> {
    /// Start recording `list` for `camera`
    pub(crate) fn begin(
        res: &'a FrameResources<'a>,
        info: FrameInfo,
        camera: CameraHandle,
        camera_buffer: CameraBuffer,
        mut list: Box<dyn CommandList>,
    ) -> Result<Self> {
        let camera_world = res.transforms.world_matrix(camera_buffer.transform)?;
        list.begin()?;
        Ok(Self {
            res,
            info,
            camera,
            camera_buffer,
            camera_world,
            list,
            target: None,
            in_pass: false,
            material: None,
            draw_count: 0,
        })
    }

    pub fn camera(&self) -> CameraHandle {
        self.camera
    }

    pub fn camera_buffer(&self) -> &CameraBuffer {
        &self.camera_buffer
    }

    /// Currently bound material, if any
    pub fn material(&self) -> Option<ProgramHandle> {
        self.material.as_ref().map(|m| m.handle)
    }

    /// Currently bound render target, if a pass is open
    pub fn render_target(&self) -> Option<RenderTarget> {
        self.target.as_ref().filter(|_| self.in_pass).map(|t| t.target)
    }

    /// Draw calls recorded so far
    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }

    // ===== RENDER TARGETS =====

    fn resolve_target(&self, target: RenderTarget) -> Result<BoundTarget> {
        match target {
            RenderTarget::Swapchain => {
                let (width, height) = self.info.surface_size;
                Ok(BoundTarget {
                    target,
                    target_ref: RenderTargetRef::Swapchain { image_index: self.info.image_index },
                    layout: TargetLayout::Swapchain,
                    width,
                    height,
                })
            }
            RenderTarget::Texture(handle) => {
                let texture = self.res.tables.render_textures.get(handle)?;
                Ok(BoundTarget {
                    target,
                    layout: TargetLayout::Texture {
                        color_count: texture.texture_count(),
                        depth: texture.has_depth(),
                        hdr: texture.is_hdr(),
                    },
                    width: texture.width(),
                    height: texture.height(),
                    target_ref: RenderTargetRef::Texture(texture),
                })
            }
        }
    }

    fn end_pass(&mut self) -> Result<()> {
        if self.in_pass {
            self.list.end_render_pass()?;
            self.in_pass = false;
        }
        Ok(())
    }

    /// The camera's own target: its render texture, or the swapchain
    pub fn bind_camera_target(&mut self) -> Result<()> {
        let target = match self.camera_buffer.render_texture {
            Some(handle) => RenderTarget::Texture(handle),
            None => RenderTarget::Swapchain,
        };
        self.bind_render_target(target)
    }

    /// End the open pass and begin one on `target`.
    ///
    /// Every attachment is cleared; viewport and scissor follow the
    /// camera's viewport scaled to the target. A bound material is rebound
    /// with the pipeline matching the new target.
    pub fn bind_render_target(&mut self, target: RenderTarget) -> Result<()> {
        self.end_pass()?;
        let bound = self.resolve_target(target)?;

        let mut clear_values = match bound.layout {
            TargetLayout::Swapchain => vec![ClearValue::Color(self.info.clear_color)],
            TargetLayout::Texture { color_count, .. } => {
                vec![ClearValue::Color(self.info.clear_color); color_count as usize]
            }
        };
        if matches!(bound.layout, TargetLayout::Texture { depth: true, .. }) {
            clear_values.push(ClearValue::DepthStencil { depth: 1.0, stencil: 0 });
        }

        self.list.begin_render_pass(&bound.target_ref, &clear_values)?;
        self.in_pass = true;

        let viewport = &self.camera_buffer.viewport;
        self.list.set_viewport(viewport.to_viewport(bound.width, bound.height))?;
        self.list.set_scissor(viewport.to_scissor(bound.width, bound.height))?;
        self.target = Some(bound);

        if let Some(material) = self.material.take() {
            self.bind_material(Some(material.handle))?;
        }
        Ok(())
    }

    /// Copy `src` into `dst`. Ends the open pass; draws afterwards need a
    /// new `bind_render_target`.
    pub fn blit(&mut self, src: RenderTarget, dst: RenderTarget) -> Result<()> {
        let RenderTarget::Texture(src) = src else {
            engine_error!("flare::RenderCommands",
                "Camera {}: blit from the swapchain is not supported, skipped", self.camera.raw());
            return Ok(());
        };

        self.end_pass()?;
        let src = self.res.tables.render_textures.get(src)?;
        let dst = self.resolve_target(dst)?;
        self.list.blit(&src, &dst.target_ref)
    }

    // ===== MATERIALS =====

    /// Bind `material` for the following draws; `None` unbinds.
    ///
    /// Binding the already bound material does nothing. Binding resets the
    /// push pools of this flight frame on the first bind of the frame,
    /// binds the static texture set and pushes the camera block when the
    /// program declares one.
    pub fn bind_material(&mut self, material: Option<ProgramHandle>) -> Result<()> {
        let Some(handle) = material else {
            self.material = None;
            return Ok(());
        };
        if self.material.as_ref().is_some_and(|m| m.handle == handle) {
            return Ok(());
        }

        let Some(target) = self.target.as_ref() else {
            engine_bail!("flare::RenderCommands",
                InvalidResource: "camera {}: bind_material({}) without a render target",
                self.camera.raw(), handle.raw());
        };
        let Some(entry) = self.res.pipelines.get(self.camera, handle) else {
            engine_bail!("flare::RenderCommands",
                InvalidHandle: "camera {} has no pipeline for program {} (render layers do not intersect)",
                self.camera.raw(), handle.raw());
        };
        let (width, height) = (target.width, target.height);
        let pipeline = entry.pipeline_for(self.res.renderer, target.layout)?;
        self.list.bind_pipeline(&pipeline)?;

        entry.push_pools().lock().begin_frame(self.info.flight_frame, self.info.attempt)?;

        let textures = self.res.registry.textures(handle)?;
        let samplers = &self.res.tables.samplers;
        let static_set = entry.bindings().static_set(
            self.res.renderer,
            &textures,
            self.res.tables.resize_epoch(),
            |sampler| samplers.get(sampler),
        )?;
        if let Some(set) = static_set {
            self.list.bind_binding_set(&pipeline, STATIC_SET_INDEX, &set)?;
        }

        self.material = Some(BoundMaterial { handle, entry, pipeline });

        if self.bound()?.entry.bindings().info().push_binding_of(ShaderBufferKind::Camera).is_some() {
            let screen_size = self.camera_buffer.viewport_size(width, height);
            let block = CameraShaderBuffer::new(&self.camera_buffer, self.camera_world, screen_size);
            self.push_uniform(ShaderBufferKind::Camera, bytemuck::bytes_of(&block))?;
        }
        Ok(())
    }

    fn bound(&self) -> Result<&BoundMaterial> {
        match self.material.as_ref() {
            Some(material) => Ok(material),
            None => engine_bail!("flare::RenderCommands",
                InvalidResource: "camera {}: no material bound", self.camera.raw()),
        }
    }

    /// Push `sampler` into the push texture binding at set `slot` of the
    /// bound material.
    ///
    /// # Errors
    ///
    /// `BindingNotFound` if the material has no push texture at that set.
    pub fn push_texture(&mut self, slot: u32, sampler: TextureSamplerHandle) -> Result<()> {
        let material = self.bound()?;
        let info = material.entry.bindings().info();
        let (index, push) = match info.push_binding_at(slot) {
            Some((index, push)) if push.kind == ShaderBufferKind::PushTexture => (index, push),
            _ => engine_bail!("flare::RenderCommands",
                BindingNotFound: "program {} has no push texture at slot {}", material.handle.raw(), slot),
        };
        let (binding, set_index) = (push.binding, push.set);

        let sampler = self.res.tables.samplers.get(sampler)?;
        let set = material.entry.push_pools().lock().allocate(self.info.flight_frame, index)?;
        set.write_sampler(binding, &sampler)?;
        let pipeline = Arc::clone(&material.pipeline);
        self.list.bind_binding_set(&pipeline, set_index, &set)
    }

    /// Push a uniform block into the push binding of `kind`
    pub(crate) fn push_uniform(&mut self, kind: ShaderBufferKind, data: &[u8]) -> Result<()> {
        let material = self.bound()?;
        let Some((index, push)) = material.entry.bindings().info().push_binding_of(kind) else {
            engine_bail!("flare::RenderCommands",
                BindingNotFound: "program {} has no {:?} binding", material.handle.raw(), kind);
        };
        let (binding, set_index) = (push.binding, push.set);

        let set = material.entry.push_pools().lock().allocate(self.info.flight_frame, index)?;
        set.write_uniform(binding, data)?;
        let pipeline = Arc::clone(&material.pipeline);
        self.list.bind_binding_set(&pipeline, set_index, &set)
    }

    // ===== DRAWS =====

    fn drawable(&self) -> Result<&BoundMaterial> {
        if !self.in_pass {
            engine_bail!("flare::RenderCommands",
                InvalidResource: "camera {}: draw outside a render pass", self.camera.raw());
        }
        self.bound()
    }

    /// Draw `model` with the bound material at `transform`
    pub fn draw_model(&mut self, transform: Mat4, model: ModelHandle) -> Result<()> {
        let material = self.drawable()?;
        let push_constant = material.entry.bindings().layout().push_constant;
        let pipeline = Arc::clone(&material.pipeline);

        if let Some(range) = push_constant {
            let block = ModelShaderBuffer::new(transform);
            self.list.push_constants(&pipeline, range.stages, range.offset, bytemuck::bytes_of(&block))?;
        }

        let model = self.res.tables.models.get(model)?;
        self.list.bind_model(&model)?;
        self.list.draw_indexed(model.index_count(), 0, 0)?;
        self.draw_count += 1;
        Ok(())
    }

    /// Draw a full-target quad (4-vertex strip) with the bound material
    pub fn draw_material(&mut self) -> Result<()> {
        self.drawable()?;
        self.list.draw(4, 0)?;
        self.draw_count += 1;
        Ok(())
    }

    /// Draw every stack whose material shares a layer with the camera
    pub(crate) fn draw_stacks(&mut self, stacks: &[MaterialRenderStack]) -> Result<()> {
        for stack in stacks {
            if self.res.pipelines.get(self.camera, stack.material()).is_none() {
                continue;
            }
            self.bind_material(Some(stack.material()))?;
            for group in stack.groups() {
                for transform in &group.transforms {
                    let world = self.res.transforms.world_matrix(*transform)?;
                    self.draw_model(world, group.model)?;
                }
            }
        }
        Ok(())
    }

    /// Close the open pass and the list
    pub(crate) fn finish(mut self) -> Result<Box<dyn CommandList>> {
        self.end_pass()?;
        self.list.end()?;
        Ok(self.list)
    }
}

#[cfg(test)]
#[path = "render_commands_tests.rs"]
mod tests;
