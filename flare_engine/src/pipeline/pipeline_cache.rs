/// Pipeline cache keyed by (camera, program).
///
/// For every live camera whose render layer intersects a program's render
/// layer the cache holds one entry. An entry carries everything a camera
/// needs to draw the program: the program description it was built from,
/// the program's binding objects (shared between cameras), the camera's own
/// push pools, and one backend pipeline per render target layout the pair
/// has drawn into. The pipeline for the camera's own target is built when
/// the entry is created, others on first use.
///
/// Entries are never evicted by age. They are dropped when the camera or
/// program is destroyed, and when a program's pipeline state changes.

use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::{engine_debug, engine_trace};
use crate::handles::{CameraHandle, ProgramHandle};
use crate::binding::{ProgramBindings, PushPools};
use crate::program::{ProgramRegistry, RenderProgram};
use crate::renderer::{Renderer, Pipeline, PipelineDesc, Shader, TargetLayout};

/// `camera | program << 32`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineKey(u64);

impl PipelineKey {
    pub fn new(camera: CameraHandle, program: ProgramHandle) -> Self {
        Self(camera.raw() as u64 | (program.raw() as u64) << 32)
    }

    pub fn camera(self) -> CameraHandle {
        CameraHandle::from_raw(self.0 as u32)
    }

    pub fn program(self) -> ProgramHandle {
        ProgramHandle::from_raw((self.0 >> 32) as u32)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

// ============================================================================
// Cached entry
// ============================================================================

/// Everything one camera needs to draw one program
pub struct CachedPipeline {
    key: PipelineKey,
    program: RenderProgram,
    vertex_shader: Arc<dyn Shader>,
    pixel_shader: Arc<dyn Shader>,
    bindings: Arc<ProgramBindings>,
    default_target: TargetLayout,
    variants: Mutex<FxHashMap<TargetLayout, Arc<dyn Pipeline>>>,
    push_pools: Mutex<PushPools>,
}

impl CachedPipeline {
    pub fn key(&self) -> PipelineKey {
        self.key
    }

    /// Program description the pipelines were built from
    pub fn program(&self) -> &RenderProgram {
        &self.program
    }

    pub fn bindings(&self) -> &Arc<ProgramBindings> {
        &self.bindings
    }

    pub fn push_pools(&self) -> &Mutex<PushPools> {
        &self.push_pools
    }

    /// Render target layout of the camera when the entry was built
    pub fn default_target(&self) -> TargetLayout {
        self.default_target
    }

    /// Number of target layouts a pipeline exists for
    pub fn variant_count(&self) -> usize {
        self.variants.lock().len()
    }

    /// Pipeline compatible with `target`, built on first request
    pub fn pipeline_for(&self, renderer: &dyn Renderer, target: TargetLayout) -> Result<Arc<dyn Pipeline>> {
        let mut variants = self.variants.lock();
        if let Some(pipeline) = variants.get(&target) {
            return Ok(Arc::clone(pipeline));
        }

        let pipeline = renderer.create_pipeline(&PipelineDesc {
            vertex_shader: &self.vertex_shader,
            pixel_shader: &self.pixel_shader,
            vertex_stride: self.program.vertex_stride,
            vertex_attributes: &self.program.vertex_attributes,
            culling_mode: self.program.culling_mode,
            primitive_mode: self.program.primitive_mode,
            enable_color_blending: self.program.enable_color_blending,
            target,
            layout: self.bindings.layout(),
        })?;

        engine_trace!("flare::PipelineCache",
            "Pipeline built for camera {} / program {} ({:?})",
            self.key.camera().raw(), self.key.program().raw(), target);
        variants.insert(target, Arc::clone(&pipeline));
        Ok(pipeline)
    }
}

// ============================================================================
// Cache
// ============================================================================

pub struct PipelineCache {
    entries: RwLock<FxHashMap<PipelineKey, Arc<CachedPipeline>>>,
    /// Binding objects per program, shared by every camera's entry
    bindings: Mutex<FxHashMap<ProgramHandle, Arc<ProgramBindings>>>,
    flight_count: usize,
    push_pool_capacity: u32,
}

impl PipelineCache {
    /// # Arguments
    ///
    /// * `flight_count` - Flight frames each entry keeps push pools for
    /// * `push_pool_capacity` - Push sets per binding per flight frame
    pub fn new(flight_count: usize, push_pool_capacity: u32) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            bindings: Mutex::new(FxHashMap::default()),
            flight_count,
            push_pool_capacity,
        }
    }

    fn program_bindings(
        &self,
        renderer: &dyn Renderer,
        handle: ProgramHandle,
        program: &RenderProgram,
    ) -> Result<Arc<ProgramBindings>> {
        let mut bindings = self.bindings.lock();
        if let Some(existing) = bindings.get(&handle) {
            return Ok(Arc::clone(existing));
        }
        let created = Arc::new(ProgramBindings::new(renderer, program)?);
        bindings.insert(handle, Arc::clone(&created));
        Ok(created)
    }

    fn build(
        &self,
        renderer: &dyn Renderer,
        registry: &ProgramRegistry,
        key: PipelineKey,
        target: TargetLayout,
    ) -> Result<Arc<CachedPipeline>> {
        let program = registry.program(key.program())?;
        let vertex_shader = registry.shader(program.vertex_shader)?;
        let pixel_shader = registry.shader(program.pixel_shader)?;
        let bindings = self.program_bindings(renderer, key.program(), &program)?;
        let push_pools = PushPools::new(
            renderer,
            bindings.push_layouts(),
            self.flight_count,
            self.push_pool_capacity,
        )?;

        let entry = CachedPipeline {
            key,
            program,
            vertex_shader,
            pixel_shader,
            bindings,
            default_target: target,
            variants: Mutex::new(FxHashMap::default()),
            push_pools: Mutex::new(push_pools),
        };
        entry.pipeline_for(renderer, target)?;
        Ok(Arc::new(entry))
    }

    /// Create the missing entries of `camera`.
    ///
    /// Only programs whose render layer intersects `camera_layer` get an
    /// entry. Returns the number of entries created.
    ///
    /// # Arguments
    ///
    /// * `renderer` - Backend building layouts, pools and pipelines
    /// * `registry` - Source of programs and shaders
    /// * `camera` - Camera to build for
    /// * `camera_layer` - Render layer mask of the camera
    /// * `target` - Layout of the camera's render target
    pub fn ensure(
        &self,
        renderer: &dyn Renderer,
        registry: &ProgramRegistry,
        camera: CameraHandle,
        camera_layer: u32,
        target: TargetLayout,
    ) -> Result<usize> {
        let mut created = 0;
        for (program, layer) in registry.render_layers() {
            if layer & camera_layer == 0 {
                continue;
            }
            let key = PipelineKey::new(camera, program);
            if self.entries.read().contains_key(&key) {
                continue;
            }

            let entry = self.build(renderer, registry, key, target)?;
            self.entries.write().insert(key, entry);
            created += 1;
        }

        if created > 0 {
            engine_debug!("flare::PipelineCache",
                "Camera {}: {} pipeline(s) created, {} cached in total",
                camera.raw(), created, self.len());
        }
        Ok(created)
    }

    pub fn get(&self, camera: CameraHandle, program: ProgramHandle) -> Option<Arc<CachedPipeline>> {
        self.entries.read().get(&PipelineKey::new(camera, program)).cloned()
    }

    /// Drop every entry of a destroyed camera
    pub fn invalidate_camera(&self, camera: CameraHandle) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| key.camera() != camera);
        before - entries.len()
    }

    /// Drop every entry of a destroyed or changed program
    pub fn invalidate_program(&self, program: ProgramHandle) -> usize {
        self.bindings.lock().remove(&program);
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| key.program() != program);
        before - entries.len()
    }

    /// Drop everything (used at teardown)
    pub fn clear(&self) {
        self.entries.write().clear();
        self.bindings.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn flight_count(&self) -> usize {
        self.flight_count
    }
}

#[cfg(test)]
#[path = "pipeline_cache_tests.rs"]
mod tests;
