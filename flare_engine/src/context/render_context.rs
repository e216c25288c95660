/// Render context - the object every host call dispatches through.
///
/// Owns the program registry, the resource tables, the pipeline cache,
/// the render stacks and the frame orchestrator of one renderer. Every
/// method takes `&self`; the tables lock internally, so the host may call
/// in from any thread while a frame is being built.

use std::sync::Arc;
use glam::{Vec2, Vec3};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use crate::config::Config;
use crate::context::ResourceTables;
use crate::error::Result;
use crate::frame::{
    FlightState, FrameOrchestrator, FrameOutcome, FrameResources, FrameSink, RenderHooks,
};
use crate::handles::*;
use crate::pipeline::PipelineCache;
use crate::program::{
    BuiltinProgram, BuiltinShaderSources, ProgramRegistry, RenderProgram,
};
use crate::renderer::{
    Renderer, ShaderCompiler, ShaderDesc, ShaderStage, ModelDesc, TextureDesc,
    SamplerDesc, SamplerSource, FilterMode, AddressMode, RenderTextureDesc,
};
use crate::scene::{
    self, CameraBuffer, LightKind, MeshRenderBuffer, RenderStackBatcher, TransformResolver,
    DirectionalLightBuffer, PointLightBuffer, SpotLightBuffer,
};
use crate::{engine_bail, engine_bail_warn, engine_debug, engine_info, engine_warn};

/// Handles of the built-in light and post-process programs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinPrograms {
    pub directional_light: ProgramHandle,
    pub point_light: ProgramHandle,
    pub spot_light: ProgramHandle,
    pub post: ProgramHandle,
}

impl BuiltinPrograms {
    /// Program drawing lights of `kind`
    pub fn for_light(&self, kind: LightKind) -> ProgramHandle {
        match kind {
            LightKind::Directional => self.directional_light,
            LightKind::Point => self.point_light,
            LightKind::Spot => self.spot_light,
        }
    }
}

/// Render stacks plus the mesh render buffers placed in them
#[derive(Default)]
struct RenderStacks {
    batcher: RenderStackBatcher,
    /// Buffer as it was when stacked, so removal matches what was added
    entries: FxHashMap<MeshRenderHandle, MeshRenderBuffer>,
}

/// Generate / destroy / get / set for one light kind
macro_rules! light_ops {
    ($table:ident, $handle:ty, $buffer:ty,
     $generate:ident, $destroy:ident, $get:ident, $set:ident) => {
        pub fn $generate(&self, transform: TransformHandle) -> $handle {
            self.tables.$table.generate(<$buffer>::new(transform))
        }

        pub fn $destroy(&self, handle: $handle) -> Result<()> {
            self.tables.$table.destroy(handle).map(|_| ())
        }

        pub fn $get(&self, handle: $handle) -> Result<$buffer> {
            self.tables.$table.get(handle)
        }

        pub fn $set(&self, handle: $handle, buffer: $buffer) -> Result<()> {
            self.tables.$table.set(handle, buffer)
        }
    };
}

pub struct RenderContext {
    renderer: Arc<dyn Renderer>,
    transforms: Arc<dyn TransformResolver>,
    compiler: Option<Arc<dyn ShaderCompiler>>,
    registry: ProgramRegistry,
    pipelines: PipelineCache,
    tables: ResourceTables,
    stacks: RwLock<RenderStacks>,
    orchestrator: Mutex<FrameOrchestrator>,
    config: Config,
}

impl RenderContext {
    /// Create a context drawing through `renderer`.
    ///
    /// # Arguments
    ///
    /// * `renderer` - Backend
    /// * `transforms` - Host transform graph
    /// * `config` - Validated before use
    ///
    /// # Errors
    ///
    /// `InitializationFailed` for an invalid config, or any backend error
    /// creating the frame sync objects.
    pub fn new(
        renderer: Arc<dyn Renderer>,
        transforms: Arc<dyn TransformResolver>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;
        let flight = FlightState::new(renderer.as_ref(), config.max_flight_frames)?;
        let orchestrator = FrameOrchestrator::new(flight, config.clear_color, config.worker_threads)?;

        engine_info!("flare::RenderContext",
            "Context created for '{}' ({} flight frame(s), {} push set(s) per binding{})",
            config.application_name, config.max_flight_frames, config.push_pool_capacity,
            if renderer.is_headless() { ", headless" } else { "" });

        Ok(Self {
            pipelines: PipelineCache::new(config.flight_pool_size(), config.push_pool_capacity),
            renderer,
            transforms,
            compiler: None,
            registry: ProgramRegistry::new(),
            tables: ResourceTables::new(),
            stacks: RwLock::new(RenderStacks::default()),
            orchestrator: Mutex::new(orchestrator),
            config,
        })
    }

    /// Compiler used by the source-based shader calls
    pub fn with_shader_compiler(mut self, compiler: Arc<dyn ShaderCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    pub fn registry(&self) -> &ProgramRegistry {
        &self.registry
    }

    pub fn pipelines(&self) -> &PipelineCache {
        &self.pipelines
    }

    pub fn tables(&self) -> &ResourceTables {
        &self.tables
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ===== SHADERS =====

    fn generate_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderHandle> {
        let Some(compiler) = self.compiler.as_ref() else {
            engine_bail!("flare::RenderContext",
                InitializationFailed: "no shader compiler installed, use generate_shader_spirv");
        };
        let code = compiler.compile(stage, source)?;
        self.generate_shader_spirv(stage, &code)
    }

    pub fn generate_vertex_shader(&self, source: &str) -> Result<ShaderHandle> {
        self.generate_shader(ShaderStage::Vertex, source)
    }

    pub fn generate_pixel_shader(&self, source: &str) -> Result<ShaderHandle> {
        self.generate_shader(ShaderStage::Pixel, source)
    }

    /// Create a shader from precompiled SPIR-V
    pub fn generate_shader_spirv(&self, stage: ShaderStage, code: &[u32]) -> Result<ShaderHandle> {
        let shader = self.renderer.create_shader(ShaderDesc { stage, entry_point: "main", code })?;
        Ok(self.registry.add_shader(shader))
    }

    /// Fails while a live program references the shader
    pub fn destroy_shader(&self, handle: ShaderHandle) -> Result<()> {
        self.registry.destroy_shader(handle)
    }

    // ===== PROGRAMS =====

    pub fn generate_program(&self, program: RenderProgram) -> Result<ProgramHandle> {
        self.registry.generate_program(program)
    }

    /// Destroy a program. Its cached pipelines and render stacks go with it.
    ///
    /// Fails only for a program that is not live; cache and stacks are
    /// always cleaned once the slot is freed.
    pub fn destroy_program(&self, handle: ProgramHandle) -> Result<()> {
        self.registry.destroy_program(handle)?;
        let dropped = self.pipelines.invalidate_program(handle);

        let mut stacks = self.stacks.write();
        let instances = stacks.batcher.remove_material(handle);
        stacks.entries.retain(|_, buffer| buffer.material != handle);
        if instances > 0 {
            engine_warn!("flare::RenderContext",
                "Program {} destroyed with {} stacked instance(s)", handle.raw(), instances);
        }
        engine_debug!("flare::RenderContext",
            "Program {} destroyed, {} pipeline(s) dropped", handle.raw(), dropped);
        Ok(())
    }

    pub fn get_program(&self, handle: ProgramHandle) -> Result<RenderProgram> {
        self.registry.program(handle)
    }

    /// Replace a program. Pipelines are rebuilt when its pipeline state or
    /// render layer changed.
    pub fn set_program(&self, handle: ProgramHandle, program: RenderProgram) -> Result<()> {
        let previous_layer = self.registry.program(handle)?.render_layer;
        let layer_changed = previous_layer != program.render_layer;
        let state_changed = self.registry.set_program(handle, program)?;
        if state_changed || layer_changed {
            self.pipelines.invalidate_program(handle);
        }
        Ok(())
    }

    pub fn set_program_texture(&self, handle: ProgramHandle, slot: u16, sampler: TextureSamplerHandle) -> Result<()> {
        if !self.tables.samplers.contains(sampler) {
            engine_bail!("flare::RenderContext",
                InvalidHandle: "texture sampler {} is not live", sampler.raw());
        }
        self.registry.set_texture(handle, slot, sampler)
    }

    /// Compile and register the light and post-process programs.
    ///
    /// Each program gets its own pair of shaders, destroyed with it.
    pub fn register_builtin_programs(&self, sources: &BuiltinShaderSources) -> Result<BuiltinPrograms> {
        let mut handles = [ProgramHandle::from_raw(0); 4];
        for (slot, builtin) in handles.iter_mut().zip(BuiltinProgram::ALL) {
            let vertex = self.generate_vertex_shader(sources.quad_vertex)?;
            let pixel = self.generate_pixel_shader(sources.pixel_source(builtin))?;
            *slot = self.generate_program(builtin.describe(vertex, pixel))?;
        }

        let [directional_light, point_light, spot_light, post] = handles;
        Ok(BuiltinPrograms { directional_light, point_light, spot_light, post })
    }

    // ===== CAMERAS =====

    pub fn generate_camera(&self, transform: TransformHandle) -> CameraHandle {
        self.tables.cameras.generate(CameraBuffer::new(transform))
    }

    pub fn destroy_camera(&self, handle: CameraHandle) -> Result<()> {
        self.tables.cameras.destroy(handle)?;
        self.pipelines.invalidate_camera(handle);
        Ok(())
    }

    pub fn get_camera(&self, handle: CameraHandle) -> Result<CameraBuffer> {
        self.tables.cameras.get(handle)
    }

    pub fn set_camera(&self, handle: CameraHandle, camera: CameraBuffer) -> Result<()> {
        if let Some(target) = camera.render_texture {
            if !self.tables.render_textures.contains(target) {
                engine_bail!("flare::RenderContext",
                    InvalidHandle: "camera {} targets render texture {} which is not live",
                    handle.raw(), target.raw());
            }
        }
        let previous = self.tables.cameras.get(handle)?;
        self.tables.cameras.set(handle, camera)?;
        if previous.render_layer != camera.render_layer {
            self.pipelines.invalidate_camera(handle);
        }
        Ok(())
    }

    /// World position under a normalized screen position (`xy` in
    /// `[0, 1]`, `z` the depth)
    pub fn screen_to_world(&self, handle: CameraHandle, screen: Vec3, screen_size: Vec2) -> Result<Vec3> {
        let camera = self.tables.cameras.get(handle)?;
        let world = self.transforms.world_matrix(camera.transform)?;
        Ok(scene::screen_to_world(&camera, world, screen, screen_size))
    }

    pub fn world_to_screen(&self, handle: CameraHandle, position: Vec3, screen_size: Vec2) -> Result<Vec3> {
        let camera = self.tables.cameras.get(handle)?;
        let world = self.transforms.world_matrix(camera.transform)?;
        Ok(scene::world_to_screen(&camera, world, position, screen_size))
    }

    // ===== LIGHTS =====

    light_ops!(directional_lights, DirectionalLightHandle, DirectionalLightBuffer,
        generate_directional_light, destroy_directional_light,
        get_directional_light, set_directional_light);

    light_ops!(point_lights, PointLightHandle, PointLightBuffer,
        generate_point_light, destroy_point_light,
        get_point_light, set_point_light);

    light_ops!(spot_lights, SpotLightHandle, SpotLightBuffer,
        generate_spot_light, destroy_spot_light,
        get_spot_light, set_spot_light);

    // ===== MODELS =====

    /// Upload a model.
    ///
    /// # Arguments
    ///
    /// * `vertices` - Interleaved vertex bytes
    /// * `vertex_count` - Number of vertices in `vertices`
    /// * `indices` - Triangle indices
    /// * `stride` - Size of one vertex in bytes
    ///
    /// # Errors
    ///
    /// `InvalidResource` for an empty model (no vertices, no indices or a
    /// zero stride), too few vertex bytes or an index past the last vertex.
    pub fn generate_model(&self, vertices: &[u8], vertex_count: u32, indices: &[u32], stride: u16) -> Result<ModelHandle> {
        if vertex_count == 0 || indices.is_empty() || stride == 0 {
            engine_bail!("flare::RenderContext",
                InvalidResource: "model needs vertices, indices and a stride (got {} vertices, {} indices, stride {})",
                vertex_count, indices.len(), stride);
        }
        let expected = vertex_count as usize * stride as usize;
        if vertices.len() < expected {
            engine_bail!("flare::RenderContext",
                InvalidResource: "model has {} vertex byte(s), {} vertices of stride {} need {}",
                vertices.len(), vertex_count, stride, expected);
        }
        if let Some(index) = indices.iter().find(|i| **i >= vertex_count) {
            engine_bail!("flare::RenderContext",
                InvalidResource: "model index {} out of range ({} vertices)", index, vertex_count);
        }

        let model = self.renderer.create_model(ModelDesc { vertices, vertex_count, indices, stride })?;
        Ok(self.tables.models.generate(model))
    }

    /// # Errors
    ///
    /// `InvalidResource` while a mesh render buffer still draws the model.
    pub fn destroy_model(&self, handle: ModelHandle) -> Result<()> {
        let users = self.tables.mesh_renders.count_where(|m| m.model == handle);
        if users > 0 {
            engine_bail_warn!("flare::RenderContext",
                InvalidResource: "model {} is still drawn by {} mesh render buffer(s)", handle.raw(), users);
        }
        self.tables.models.destroy(handle).map(|_| ())
    }

    // ===== TEXTURES & SAMPLERS =====

    /// Upload an RGBA8 texture
    pub fn generate_texture(&self, width: u32, height: u32, data: &[u8]) -> Result<TextureHandle> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            engine_bail!("flare::RenderContext",
                InvalidResource: "texture {}x{} needs {} bytes, got {}",
                width, height, width as usize * height as usize * 4, data.len());
        }
        let texture = self.renderer.create_texture(TextureDesc { width, height, data })?;
        Ok(self.tables.textures.generate(texture))
    }

    pub fn destroy_texture(&self, handle: TextureHandle) -> Result<()> {
        self.tables.textures.destroy(handle).map(|_| ())
    }

    fn generate_sampler(&self, source: SamplerSource, filter: FilterMode, address: AddressMode) -> Result<TextureSamplerHandle> {
        let sampler = self.renderer.create_sampler(SamplerDesc { source, filter, address })?;
        Ok(self.tables.samplers.generate(sampler))
    }

    pub fn generate_texture_sampler(
        &self,
        texture: TextureHandle,
        filter: FilterMode,
        address: AddressMode,
    ) -> Result<TextureSamplerHandle> {
        let texture = self.tables.textures.get(texture)?;
        self.generate_sampler(SamplerSource::Texture(texture), filter, address)
    }

    /// Sampler over color attachment `index` of a render texture
    pub fn generate_render_texture_sampler(
        &self,
        target: RenderTextureHandle,
        index: u32,
        filter: FilterMode,
        address: AddressMode,
    ) -> Result<TextureSamplerHandle> {
        let texture = self.tables.render_textures.get(target)?;
        if index >= texture.texture_count() {
            engine_bail!("flare::RenderContext",
                InvalidResource: "render texture {} has {} attachment(s), no index {}",
                target.raw(), texture.texture_count(), index);
        }
        self.generate_sampler(SamplerSource::RenderTexture { target: texture, index }, filter, address)
    }

    pub fn generate_render_texture_depth_sampler(
        &self,
        target: RenderTextureHandle,
        filter: FilterMode,
        address: AddressMode,
    ) -> Result<TextureSamplerHandle> {
        let texture = self.tables.render_textures.get(target)?;
        if !texture.has_depth() {
            engine_bail!("flare::RenderContext",
                InvalidResource: "render texture {} has no depth attachment", target.raw());
        }
        self.generate_sampler(SamplerSource::RenderTextureDepth(texture), filter, address)
    }

    /// Destroy a sampler and unbind it from every program
    pub fn destroy_texture_sampler(&self, handle: TextureSamplerHandle) -> Result<()> {
        self.tables.samplers.destroy(handle)?;
        self.registry.release_sampler(handle);
        Ok(())
    }

    // ===== RENDER TEXTURES =====

    pub fn generate_render_texture(
        &self,
        count: u32,
        width: u32,
        height: u32,
        depth: bool,
        hdr: bool,
    ) -> Result<RenderTextureHandle> {
        if count == 0 || width == 0 || height == 0 {
            engine_bail!("flare::RenderContext",
                InvalidResource: "render texture needs at least one {}x{} attachment, got {}",
                width, height, count);
        }
        let texture = self.renderer.create_render_texture(RenderTextureDesc { count, width, height, depth, hdr })?;
        Ok(self.tables.render_textures.generate(texture))
    }

    pub fn destroy_render_texture(&self, handle: RenderTextureHandle) -> Result<()> {
        let users = self.tables.cameras.count_where(|c| c.render_texture == Some(handle));
        if users > 0 {
            engine_bail_warn!("flare::RenderContext",
                InvalidResource: "render texture {} is the target of {} camera(s)", handle.raw(), users);
        }
        self.tables.render_textures.destroy(handle).map(|_| ())
    }

    pub fn render_texture_texture_count(&self, handle: RenderTextureHandle) -> Result<u32> {
        self.tables.render_textures.with(handle, |t| t.texture_count())
    }

    pub fn render_texture_width(&self, handle: RenderTextureHandle) -> Result<u32> {
        self.tables.render_textures.with(handle, |t| t.width())
    }

    pub fn render_texture_height(&self, handle: RenderTextureHandle) -> Result<u32> {
        self.tables.render_textures.with(handle, |t| t.height())
    }

    pub fn render_texture_has_depth(&self, handle: RenderTextureHandle) -> Result<bool> {
        self.tables.render_textures.with(handle, |t| t.has_depth())
    }

    /// Recreate the attachments at a new size.
    ///
    /// Waits for the GPU first; samplers over the texture are rewritten
    /// into static sets on their next bind.
    pub fn resize_render_texture(&self, handle: RenderTextureHandle, width: u32, height: u32) -> Result<()> {
        let texture = self.tables.render_textures.get(handle)?;
        self.renderer.wait_idle()?;
        texture.resize(width, height)?;
        self.tables.bump_resize_epoch();
        Ok(())
    }

    // ===== MESH RENDERS & RENDER STACKS =====

    pub fn generate_mesh_render_buffer(
        &self,
        material: ProgramHandle,
        model: ModelHandle,
        transform: TransformHandle,
    ) -> Result<MeshRenderHandle> {
        if !self.registry.contains(material) {
            engine_bail!("flare::RenderContext", InvalidHandle: "program {} is not live", material.raw());
        }
        if !self.tables.models.contains(model) {
            engine_bail!("flare::RenderContext", InvalidHandle: "model {} is not live", model.raw());
        }
        Ok(self.tables.mesh_renders.generate(MeshRenderBuffer { material, model, transform }))
    }

    /// Destroy a mesh render buffer, taking it out of the render stacks
    pub fn destroy_mesh_render_buffer(&self, handle: MeshRenderHandle) -> Result<()> {
        self.tables.mesh_renders.destroy(handle)?;
        let mut stacks = self.stacks.write();
        if let Some(buffer) = stacks.entries.remove(&handle) {
            stacks.batcher.remove(&buffer);
        }
        Ok(())
    }

    /// Add a mesh render buffer to the render stack of its material
    pub fn generate_render_stack_entry(&self, handle: MeshRenderHandle) -> Result<()> {
        let buffer = self.tables.mesh_renders.get(handle)?;
        let mut stacks = self.stacks.write();
        if stacks.entries.contains_key(&handle) {
            engine_bail_warn!("flare::RenderContext",
                InvalidResource: "mesh render buffer {} is already stacked", handle.raw());
        }
        stacks.batcher.add(&buffer);
        stacks.entries.insert(handle, buffer);
        Ok(())
    }

    pub fn destroy_render_stack_entry(&self, handle: MeshRenderHandle) -> Result<()> {
        let mut stacks = self.stacks.write();
        let Some(buffer) = stacks.entries.remove(&handle) else {
            engine_bail_warn!("flare::RenderContext",
                InvalidResource: "mesh render buffer {} is not stacked", handle.raw());
        };
        stacks.batcher.remove(&buffer);
        Ok(())
    }

    /// Number of render stacks (distinct stacked materials)
    pub fn render_stack_count(&self) -> usize {
        self.stacks.read().batcher.len()
    }

    // ===== FRAME =====

    /// Render one frame.
    ///
    /// # Arguments
    ///
    /// * `hooks` - Host lifecycle hooks run on every camera
    /// * `sink` - Receives the frame pixels when headless
    pub fn render_frame(&self, hooks: &dyn RenderHooks, sink: Option<&dyn FrameSink>) -> Result<FrameOutcome> {
        let stacks = self.stacks.read().batcher.stacks().to_vec();
        let resources = FrameResources {
            renderer: self.renderer.as_ref(),
            registry: &self.registry,
            pipelines: &self.pipelines,
            tables: &self.tables,
            transforms: self.transforms.as_ref(),
        };
        self.orchestrator.lock().render_frame(&resources, &stacks, hooks, sink)
    }

    /// The surface changed size
    pub fn handle_resize(&self, width: u32, height: u32) -> Result<()> {
        self.renderer.wait_idle()?;
        self.renderer.resize(width, height)
    }

    /// Frames submitted so far
    pub fn frame_counter(&self) -> u64 {
        self.orchestrator.lock().flight().frame_counter()
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if let Err(e) = self.renderer.wait_idle() {
            engine_warn!("flare::RenderContext", "wait_idle failed during teardown: {}", e);
        }

        for (kind, count) in self.tables.live_counts() {
            if count > 0 {
                engine_debug!("flare::RenderContext", "Releasing {} live {}(s)", count, kind);
            }
        }
        self.pipelines.clear();
        self.tables.clear();
        let (programs, shaders) = self.registry.clear();
        engine_debug!("flare::RenderContext",
            "Context destroyed ({} program(s), {} shader(s) released)", programs, shaders);
    }
}

#[cfg(test)]
#[path = "render_context_tests.rs"]
mod tests;
