/// Mock Renderer for unit tests (no GPU required)
///
/// Every object gets a unique id, every recorded command is kept, and every
/// queue operation is appended to a shared event log so tests can check
/// submission order and the semaphore chain.

use std::any::Any;
use std::sync::Arc;
use parking_lot::Mutex;

use crate::renderer::{
    Renderer, Semaphore, Fence, SubmitInfo, AcquireResult,
    CommandList, BoundResource, RenderTargetRef, Viewport, Rect2D, ClearValue,
    Shader, ShaderDesc, ShaderStage, ShaderStages, ShaderCompiler,
    Model, ModelDesc, Texture, TextureDesc, Sampler, SamplerDesc, SamplerSource,
    RenderTexture, RenderTextureDesc,
    BindingLayout, BindingLayoutDesc, BindingSet, BindingPool,
    Pipeline, PipelineDesc, TargetLayout, CullingMode, PrimitiveMode,
};
use crate::error::Result;
use crate::engine_bail;

// ============================================================================
// Shared state
// ============================================================================

/// Destination of a recorded render pass or blit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockTarget {
    Swapchain(u32),
    Texture(u64),
}

/// A recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    Begin,
    End,
    BeginRenderPass { target: MockTarget, clear_count: usize },
    EndRenderPass,
    SetViewport(Viewport),
    SetScissor(Rect2D),
    BindPipeline(u64),
    BindBindingSet { set_index: u32, set: u64 },
    PushConstants { stages: ShaderStages, offset: u32, data: Vec<u8> },
    BindModel(u64),
    DrawIndexed { index_count: u32 },
    Draw { vertex_count: u32 },
    Blit { src: u64, dst: MockTarget },
}

/// A queue-level operation
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Acquire { signal: Semaphore, image: u32 },
    Submit {
        list: u64,
        commands: Vec<MockCommand>,
        wait: Option<Semaphore>,
        signal: Option<Semaphore>,
        fence: Option<Fence>,
    },
    Present { image: u32, wait: Semaphore },
    WaitFence(Fence),
    ResetFence(Fence),
    ResetCommandLists(usize),
    Resize(u32, u32),
}

/// What was written into a binding set
#[derive(Debug, Clone, PartialEq)]
pub enum MockWrite {
    Sampler(u64),
    Uniform(Vec<u8>),
}

/// Pipeline creation record
#[derive(Debug, Clone, PartialEq)]
pub struct MockPipelineInfo {
    pub id: u64,
    pub target: TargetLayout,
    pub culling_mode: CullingMode,
    pub primitive_mode: PrimitiveMode,
    pub enable_color_blending: bool,
    pub set_indices: Vec<u32>,
    pub push_constant_size: Option<u32>,
}

#[derive(Default)]
pub struct MockState {
    next_id: u64,
    pub events: Vec<MockEvent>,
    pub pipelines: Vec<MockPipelineInfo>,
    pub binding_writes: Vec<(u64, u32, MockWrite)>,
    pub command_lists_created: usize,
    pub surface_size: (u32, u32),
    pub headless: bool,
    /// Next acquire reports an out-of-date surface
    pub acquire_out_of_date: bool,
    /// Next present reports an out-of-date surface
    pub present_out_of_date: bool,
    /// Next pipeline creation fails
    pub fail_next_pipeline: bool,
    /// Resources bound by dropped command lists, per flight frame
    retained: Vec<Vec<BoundResource>>,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Resources kept alive for `flight_frame`
    pub fn retained_count(&self, flight_frame: usize) -> usize {
        self.retained.get(flight_frame).map_or(0, Vec::len)
    }
}

type SharedState = Arc<Mutex<MockState>>;

// ============================================================================
// Mock resources
// ============================================================================

pub struct MockShader {
    pub id: u64,
    pub stage: ShaderStage,
}

impl Shader for MockShader {
    fn stage(&self) -> ShaderStage { self.stage }
    fn as_any(&self) -> &dyn Any { self }
}

pub struct MockModel {
    pub id: u64,
    pub index_count: u32,
    pub vertex_count: u32,
}

impl Model for MockModel {
    fn index_count(&self) -> u32 { self.index_count }
    fn vertex_count(&self) -> u32 { self.vertex_count }
    fn as_any(&self) -> &dyn Any { self }
}

pub struct MockTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

impl Texture for MockTexture {
    fn width(&self) -> u32 { self.width }
    fn height(&self) -> u32 { self.height }
    fn as_any(&self) -> &dyn Any { self }
}

pub struct MockSampler {
    pub id: u64,
    pub source: SamplerSource,
}

impl Sampler for MockSampler {
    fn source(&self) -> &SamplerSource { &self.source }
    fn as_any(&self) -> &dyn Any { self }
}

pub struct MockRenderTexture {
    pub id: u64,
    desc: Mutex<RenderTextureDesc>,
}

impl RenderTexture for MockRenderTexture {
    fn texture_count(&self) -> u32 { self.desc.lock().count }
    fn width(&self) -> u32 { self.desc.lock().width }
    fn height(&self) -> u32 { self.desc.lock().height }
    fn has_depth(&self) -> bool { self.desc.lock().depth }
    fn is_hdr(&self) -> bool { self.desc.lock().hdr }

    fn resize(&self, width: u32, height: u32) -> Result<()> {
        let mut desc = self.desc.lock();
        desc.width = width;
        desc.height = height;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }
}

pub struct MockBindingLayout {
    pub id: u64,
    desc: BindingLayoutDesc,
}

impl BindingLayout for MockBindingLayout {
    fn desc(&self) -> &BindingLayoutDesc { &self.desc }
    fn as_any(&self) -> &dyn Any { self }
}

pub struct MockBindingSet {
    pub id: u64,
    state: SharedState,
    dropped: Arc<Mutex<Vec<u64>>>,
}

impl Drop for MockBindingSet {
    fn drop(&mut self) {
        self.dropped.lock().push(self.id);
    }
}

impl BindingSet for MockBindingSet {
    fn write_sampler(&self, binding: u32, sampler: &Arc<dyn Sampler>) -> Result<()> {
        let sampler_id = sampler.as_any().downcast_ref::<MockSampler>().map_or(0, |s| s.id);
        self.state.lock().binding_writes.push((self.id, binding, MockWrite::Sampler(sampler_id)));
        Ok(())
    }

    fn write_uniform(&self, binding: u32, data: &[u8]) -> Result<()> {
        self.state.lock().binding_writes.push((self.id, binding, MockWrite::Uniform(data.to_vec())));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }
}

pub struct MockBindingPool {
    state: SharedState,
    dropped: Arc<Mutex<Vec<u64>>>,
    capacity: u32,
    allocated: Mutex<u32>,
}

impl BindingPool for MockBindingPool {
    fn allocate(&self) -> Result<Arc<dyn BindingSet>> {
        let mut allocated = self.allocated.lock();
        if *allocated >= self.capacity {
            engine_bail!("flare::mock", ResourceExhausted: "mock binding pool exhausted");
        }
        *allocated += 1;
        let id = self.state.lock().next_id();
        Ok(Arc::new(MockBindingSet {
            id,
            state: Arc::clone(&self.state),
            dropped: Arc::clone(&self.dropped),
        }))
    }

    fn reset(&self) -> Result<()> {
        *self.allocated.lock() = 0;
        Ok(())
    }

    fn capacity(&self) -> u32 { self.capacity }
}

pub struct MockPipeline {
    pub id: u64,
    target: TargetLayout,
}

impl Pipeline for MockPipeline {
    fn target(&self) -> TargetLayout { self.target }
    fn as_any(&self) -> &dyn Any { self }
}

// ============================================================================
// Mock CommandList
// ============================================================================

pub struct MockCommandList {
    pub id: u64,
    pub commands: Vec<MockCommand>,
    flight_frame: usize,
    state: SharedState,
    bound: Vec<BoundResource>,
}

impl Drop for MockCommandList {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.retained.len() <= self.flight_frame {
            state.retained.resize_with(self.flight_frame + 1, Vec::new);
        }
        state.retained[self.flight_frame].append(&mut self.bound);
    }
}

fn target_of(target: &RenderTargetRef) -> MockTarget {
    match target {
        RenderTargetRef::Swapchain { image_index } => MockTarget::Swapchain(*image_index),
        RenderTargetRef::Texture(rt) => MockTarget::Texture(
            rt.as_any().downcast_ref::<MockRenderTexture>().map_or(0, |t| t.id),
        ),
    }
}

impl MockCommandList {
    fn keep_target(&mut self, target: &RenderTargetRef) {
        if let RenderTargetRef::Texture(rt) = target {
            self.bound.push(BoundResource::RenderTexture(Arc::clone(rt)));
        }
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        self.commands.push(MockCommand::Begin);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.commands.push(MockCommand::End);
        Ok(())
    }

    fn begin_render_pass(&mut self, target: &RenderTargetRef, clear_values: &[ClearValue]) -> Result<()> {
        self.commands.push(MockCommand::BeginRenderPass {
            target: target_of(target),
            clear_count: clear_values.len(),
        });
        self.keep_target(target);
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.commands.push(MockCommand::EndRenderPass);
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.commands.push(MockCommand::SetViewport(viewport));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.commands.push(MockCommand::SetScissor(scissor));
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        let id = pipeline.as_any().downcast_ref::<MockPipeline>().map_or(0, |p| p.id);
        self.commands.push(MockCommand::BindPipeline(id));
        self.bound.push(BoundResource::Pipeline(Arc::clone(pipeline)));
        Ok(())
    }

    fn bind_binding_set(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        set: &Arc<dyn BindingSet>,
    ) -> Result<()> {
        self.bound.push(BoundResource::BindingSet(Arc::clone(set)));
        let set = set.as_any().downcast_ref::<MockBindingSet>().map_or(0, |s| s.id);
        self.commands.push(MockCommand::BindBindingSet { set_index, set });
        Ok(())
    }

    fn push_constants(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.commands.push(MockCommand::PushConstants { stages, offset, data: data.to_vec() });
        Ok(())
    }

    fn bind_model(&mut self, model: &Arc<dyn Model>) -> Result<()> {
        let id = model.as_any().downcast_ref::<MockModel>().map_or(0, |m| m.id);
        self.commands.push(MockCommand::BindModel(id));
        self.bound.push(BoundResource::Model(Arc::clone(model)));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, _first_index: u32, _vertex_offset: i32) -> Result<()> {
        self.commands.push(MockCommand::DrawIndexed { index_count });
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, _first_vertex: u32) -> Result<()> {
        self.commands.push(MockCommand::Draw { vertex_count });
        Ok(())
    }

    fn blit(&mut self, src: &Arc<dyn RenderTexture>, dst: &RenderTargetRef) -> Result<()> {
        self.bound.push(BoundResource::RenderTexture(Arc::clone(src)));
        self.keep_target(dst);
        let src = src.as_any().downcast_ref::<MockRenderTexture>().map_or(0, |t| t.id);
        self.commands.push(MockCommand::Blit { src, dst: target_of(dst) });
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }
}

// ============================================================================
// Mock Renderer
// ============================================================================

/// Recording renderer; clones share the same state
#[derive(Clone)]
pub struct MockRenderer {
    pub state: SharedState,
    /// Ids of binding sets dropped so far
    pub dropped_sets: Arc<Mutex<Vec<u64>>>,
}

impl MockRenderer {
    /// Presenting mock with an 800x600 surface
    pub fn new() -> Self {
        Self::with_state(MockState { surface_size: (800, 600), ..Default::default() })
    }

    /// Headless mock rendering at `width` x `height`
    pub fn headless(width: u32, height: u32) -> Self {
        Self::with_state(MockState { surface_size: (width, height), headless: true, ..Default::default() })
    }

    fn with_state(state: MockState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            dropped_sets: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every queue event recorded so far
    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().events.clone()
    }

    /// Submit events only
    pub fn submissions(&self) -> Vec<MockEvent> {
        self.events().into_iter().filter(|e| matches!(e, MockEvent::Submit { .. })).collect()
    }

    /// Number of pipelines created
    pub fn pipeline_count(&self) -> usize {
        self.state.lock().pipelines.len()
    }

    /// Forget recorded events (keeps created objects)
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }
}

impl Renderer for MockRenderer {
    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        let id = self.state.lock().next_id();
        Ok(Arc::new(MockShader { id, stage: desc.stage }))
    }

    fn create_model(&self, desc: ModelDesc) -> Result<Arc<dyn Model>> {
        let id = self.state.lock().next_id();
        Ok(Arc::new(MockModel {
            id,
            index_count: desc.indices.len() as u32,
            vertex_count: desc.vertex_count,
        }))
    }

    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        let id = self.state.lock().next_id();
        Ok(Arc::new(MockTexture { id, width: desc.width, height: desc.height }))
    }

    fn create_sampler(&self, desc: SamplerDesc) -> Result<Arc<dyn Sampler>> {
        let id = self.state.lock().next_id();
        Ok(Arc::new(MockSampler { id, source: desc.source }))
    }

    fn create_render_texture(&self, desc: RenderTextureDesc) -> Result<Arc<dyn RenderTexture>> {
        let id = self.state.lock().next_id();
        Ok(Arc::new(MockRenderTexture { id, desc: Mutex::new(desc) }))
    }

    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>> {
        let id = self.state.lock().next_id();
        Ok(Arc::new(MockBindingLayout { id, desc: desc.clone() }))
    }

    fn create_binding_set(&self, _layout: &Arc<dyn BindingLayout>) -> Result<Arc<dyn BindingSet>> {
        let id = self.state.lock().next_id();
        Ok(Arc::new(MockBindingSet {
            id,
            state: Arc::clone(&self.state),
            dropped: Arc::clone(&self.dropped_sets),
        }))
    }

    fn create_binding_pool(&self, _layout: &Arc<dyn BindingLayout>, capacity: u32) -> Result<Box<dyn BindingPool>> {
        Ok(Box::new(MockBindingPool {
            state: Arc::clone(&self.state),
            dropped: Arc::clone(&self.dropped_sets),
            capacity,
            allocated: Mutex::new(0),
        }))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        let mut state = self.state.lock();
        if state.fail_next_pipeline {
            state.fail_next_pipeline = false;
            drop(state);
            engine_bail!("flare::mock", "mock pipeline creation failed");
        }
        let id = state.next_id();
        state.pipelines.push(MockPipelineInfo {
            id,
            target: desc.target,
            culling_mode: desc.culling_mode,
            primitive_mode: desc.primitive_mode,
            enable_color_blending: desc.enable_color_blending,
            set_indices: desc.layout.set_layouts.iter().map(|(index, _)| *index).collect(),
            push_constant_size: desc.layout.push_constant.map(|range| range.size),
        });
        Ok(Arc::new(MockPipeline { id, target: desc.target }))
    }

    fn create_command_list(&self, flight_frame: usize) -> Result<Box<dyn CommandList>> {
        let mut state = self.state.lock();
        state.command_lists_created += 1;
        let id = state.next_id();
        Ok(Box::new(MockCommandList {
            id,
            commands: Vec::new(),
            flight_frame,
            state: Arc::clone(&self.state),
            bound: Vec::new(),
        }))
    }

    fn reset_command_lists(&self, flight_frame: usize) -> Result<()> {
        let released = {
            let mut state = self.state.lock();
            state.events.push(MockEvent::ResetCommandLists(flight_frame));
            state.retained.get_mut(flight_frame).map(std::mem::take)
        };
        // Dropped outside the lock, binding sets log their drop
        drop(released);
        Ok(())
    }

    fn create_semaphore(&self) -> Result<Semaphore> {
        Ok(Semaphore(self.state.lock().next_id()))
    }

    fn create_fence(&self, _signaled: bool) -> Result<Fence> {
        Ok(Fence(self.state.lock().next_id()))
    }

    fn wait_fence(&self, fence: Fence) -> Result<()> {
        self.state.lock().events.push(MockEvent::WaitFence(fence));
        Ok(())
    }

    fn reset_fence(&self, fence: Fence) -> Result<()> {
        self.state.lock().events.push(MockEvent::ResetFence(fence));
        Ok(())
    }

    fn submit(&self, info: SubmitInfo) -> Result<()> {
        let list = match info.command_list.as_any().downcast_ref::<MockCommandList>() {
            Some(list) => list,
            None => engine_bail!("flare::mock", "foreign command list submitted"),
        };
        self.state.lock().events.push(MockEvent::Submit {
            list: list.id,
            commands: list.commands.clone(),
            wait: info.wait,
            signal: info.signal,
            fence: info.fence,
        });
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }

    fn is_headless(&self) -> bool {
        self.state.lock().headless
    }

    fn surface_size(&self) -> (u32, u32) {
        self.state.lock().surface_size
    }

    fn acquire_next_image(&self, signal: Semaphore) -> Result<AcquireResult> {
        let mut state = self.state.lock();
        if state.acquire_out_of_date {
            state.acquire_out_of_date = false;
            return Ok(AcquireResult::OutOfDate);
        }
        state.events.push(MockEvent::Acquire { signal, image: 0 });
        Ok(AcquireResult::Image(0))
    }

    fn present(&self, image_index: u32, wait: Semaphore) -> Result<bool> {
        let mut state = self.state.lock();
        state.events.push(MockEvent::Present { image: image_index, wait });
        if state.present_out_of_date {
            state.present_out_of_date = false;
            return Ok(false);
        }
        Ok(true)
    }

    fn resize(&self, width: u32, height: u32) -> Result<()> {
        let mut state = self.state.lock();
        state.surface_size = (width, height);
        state.events.push(MockEvent::Resize(width, height));
        Ok(())
    }

    fn read_back_frame(&self) -> Result<Option<Vec<u8>>> {
        let state = self.state.lock();
        if !state.headless {
            return Ok(None);
        }
        let (w, h) = state.surface_size;
        Ok(Some(vec![0x7f; (w * h * 4) as usize]))
    }
}

// ============================================================================
// Mock shader compiler
// ============================================================================

/// Compiler that turns any non-empty source into a fixed SPIR-V header
pub struct MockShaderCompiler;

impl ShaderCompiler for MockShaderCompiler {
    fn compile(&self, _stage: ShaderStage, source: &str) -> Result<Vec<u32>> {
        if source.trim().is_empty() {
            engine_bail!("flare::mock", InvalidResource: "empty shader source");
        }
        Ok(vec![0x0723_0203, 0x0001_0000, 0, 1, 0])
    }
}

#[cfg(test)]
#[path = "mock_renderer_tests.rs"]
mod tests;
