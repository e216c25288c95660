/// Shared setup for frame tests: a mock renderer with a registry, cache,
/// tables and flat transforms wired together.

use std::sync::Arc;
use glam::Mat4;
use crate::context::ResourceTables;
use crate::frame::{FrameResources, FrameInfo};
use crate::handles::{CameraHandle, ModelHandle, ProgramHandle, RenderTextureHandle};
use crate::pipeline::PipelineCache;
use crate::program::{ProgramRegistry, RenderProgram, ShaderBufferInput, ShaderBufferKind};
use crate::renderer::mock_renderer::{MockRenderer, MockShader};
use crate::renderer::{Renderer, ModelDesc, RenderTextureDesc, ShaderStage, ShaderStages};
use crate::scene::{CameraBuffer, FlatTransforms, MaterialRenderStack, MeshRenderBuffer, RenderStackBatcher};

pub struct Fixture {
    pub renderer: MockRenderer,
    pub registry: ProgramRegistry,
    pub pipelines: PipelineCache,
    pub tables: ResourceTables,
    pub transforms: FlatTransforms,
    pub batcher: RenderStackBatcher,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_renderer(MockRenderer::new())
    }

    pub fn headless(width: u32, height: u32) -> Self {
        Self::with_renderer(MockRenderer::headless(width, height))
    }

    fn with_renderer(renderer: MockRenderer) -> Self {
        Self {
            renderer,
            registry: ProgramRegistry::new(),
            pipelines: PipelineCache::new(3, 8),
            tables: ResourceTables::new(),
            transforms: FlatTransforms::new(),
            batcher: RenderStackBatcher::new(),
        }
    }

    pub fn resources(&self) -> FrameResources<'_> {
        FrameResources {
            renderer: &self.renderer,
            registry: &self.registry,
            pipelines: &self.pipelines,
            tables: &self.tables,
            transforms: &self.transforms,
        }
    }

    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            frame: 0,
            attempt: 1,
            flight_frame: 0,
            image_index: 0,
            surface_size: self.renderer.surface_size(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Program with a model push constant and a camera push binding in set 1
    pub fn program(&self, render_layer: u32) -> ProgramHandle {
        self.program_with(render_layer, vec![
            ShaderBufferInput::new(0, ShaderBufferKind::Model, ShaderStages::VERTEX),
            ShaderBufferInput::new(0, ShaderBufferKind::Camera, ShaderStages::ALL).in_set(1),
        ])
    }

    pub fn program_with(&self, render_layer: u32, inputs: Vec<ShaderBufferInput>) -> ProgramHandle {
        let vs = self.registry.add_shader(Arc::new(MockShader { id: 0, stage: ShaderStage::Vertex }));
        let ps = self.registry.add_shader(Arc::new(MockShader { id: 0, stage: ShaderStage::Pixel }));
        let mut program = RenderProgram::new(vs, ps);
        program.render_layer = render_layer;
        program.shader_buffer_inputs = inputs;
        self.registry.generate_program(program).unwrap()
    }

    pub fn camera(&self, render_layer: u32) -> CameraHandle {
        let transform = self.transforms.insert(Mat4::IDENTITY);
        let mut camera = CameraBuffer::new(transform);
        camera.render_layer = render_layer;
        self.tables.cameras.generate(camera)
    }

    pub fn render_texture(&self, count: u32, depth: bool) -> RenderTextureHandle {
        let texture = self.renderer.create_render_texture(RenderTextureDesc {
            count,
            width: 256,
            height: 128,
            depth,
            hdr: false,
        }).unwrap();
        self.tables.render_textures.generate(texture)
    }

    pub fn model(&self, index_count: usize) -> ModelHandle {
        let indices: Vec<u32> = (0..index_count as u32).collect();
        let model = self.renderer.create_model(ModelDesc {
            vertices: &[0; 36],
            vertex_count: 3,
            indices: &indices,
            stride: 12,
        }).unwrap();
        self.tables.models.generate(model)
    }

    /// Add one instance of `model` drawn with `material`
    pub fn instance(&mut self, material: ProgramHandle, model: ModelHandle) {
        let transform = self.transforms.insert(Mat4::IDENTITY);
        self.batcher.add(&MeshRenderBuffer { material, model, transform });
    }

    pub fn stacks(&self) -> Vec<MaterialRenderStack> {
        self.batcher.stacks().to_vec()
    }
}
