/// Unit tests for MockRenderer and associated mock types.

use super::*;
use crate::error::Error;
use crate::renderer::{BindingSlotDesc, BindingType, PipelineLayoutDesc, PushConstantRange, FilterMode, AddressMode};

fn shader(renderer: &MockRenderer, stage: ShaderStage) -> Arc<dyn Shader> {
    renderer
        .create_shader(ShaderDesc { stage, entry_point: "main", code: &[0x0723_0203] })
        .unwrap()
}

// ============================================================================
// Resources
// ============================================================================

#[test]
fn test_ids_are_unique() {
    let renderer = MockRenderer::new();
    let a = renderer.create_semaphore().unwrap();
    let b = renderer.create_semaphore().unwrap();
    let f = renderer.create_fence(true).unwrap();
    assert_ne!(a, b);
    assert_ne!(a.0, f.0);
}

#[test]
fn test_model_counts() {
    let renderer = MockRenderer::new();
    let vertices = [0u8; 36];
    let model = renderer
        .create_model(ModelDesc { vertices: &vertices, vertex_count: 3, indices: &[0, 1, 2], stride: 12 })
        .unwrap();
    assert_eq!(model.index_count(), 3);
    assert_eq!(model.vertex_count(), 3);
}

#[test]
fn test_render_texture_resize() {
    let renderer = MockRenderer::new();
    let rt = renderer
        .create_render_texture(RenderTextureDesc { count: 4, width: 64, height: 32, depth: true, hdr: true })
        .unwrap();
    assert_eq!(rt.texture_count(), 4);
    assert!(rt.has_depth());
    assert!(rt.is_hdr());

    rt.resize(128, 96).unwrap();
    assert_eq!(rt.width(), 128);
    assert_eq!(rt.height(), 96);
}

#[test]
fn test_binding_set_writes_are_recorded() {
    let renderer = MockRenderer::new();
    let layout = renderer
        .create_binding_layout(&BindingLayoutDesc {
            entries: vec![BindingSlotDesc {
                binding: 0,
                binding_type: BindingType::UniformBuffer,
                stages: ShaderStages::ALL,
                uniform_size: 4,
            }],
        })
        .unwrap();
    let set = renderer.create_binding_set(&layout).unwrap();
    set.write_uniform(0, &[1, 2, 3, 4]).unwrap();

    let texture = renderer.create_texture(TextureDesc { width: 1, height: 1, data: &[0; 4] }).unwrap();
    let sampler = renderer
        .create_sampler(SamplerDesc {
            source: SamplerSource::Texture(texture),
            filter: FilterMode::Nearest,
            address: AddressMode::ClampToEdge,
        })
        .unwrap();
    set.write_sampler(1, &sampler).unwrap();

    let writes = renderer.state.lock().binding_writes.clone();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].2, MockWrite::Uniform(vec![1, 2, 3, 4]));
    assert!(matches!(writes[1].2, MockWrite::Sampler(id) if id != 0));
}

#[test]
fn test_binding_pool_capacity() {
    let renderer = MockRenderer::new();
    let layout = renderer.create_binding_layout(&BindingLayoutDesc::default()).unwrap();
    let pool = renderer.create_binding_pool(&layout, 2).unwrap();

    pool.allocate().unwrap();
    pool.allocate().unwrap();
    assert!(matches!(pool.allocate(), Err(Error::ResourceExhausted(_))));

    pool.reset().unwrap();
    assert!(pool.allocate().is_ok());
}

#[test]
fn test_pipeline_creation_is_recorded() {
    let renderer = MockRenderer::new();
    let vs = shader(&renderer, ShaderStage::Vertex);
    let ps = shader(&renderer, ShaderStage::Pixel);
    let layout = PipelineLayoutDesc {
        push_constant: Some(PushConstantRange { stages: ShaderStages::VERTEX, offset: 0, size: 128 }),
        set_layouts: Vec::new(),
    };
    let pipeline = renderer
        .create_pipeline(&PipelineDesc {
            vertex_shader: &vs,
            pixel_shader: &ps,
            vertex_stride: 0,
            vertex_attributes: &[],
            culling_mode: CullingMode::None,
            primitive_mode: PrimitiveMode::TriangleStrip,
            enable_color_blending: true,
            target: TargetLayout::Swapchain,
            layout: &layout,
        })
        .unwrap();

    assert_eq!(pipeline.target(), TargetLayout::Swapchain);
    let info = renderer.state.lock().pipelines[0].clone();
    assert_eq!(info.push_constant_size, Some(128));
    assert_eq!(info.primitive_mode, PrimitiveMode::TriangleStrip);
}

#[test]
fn test_pipeline_failure_injection() {
    let renderer = MockRenderer::new();
    renderer.state.lock().fail_next_pipeline = true;
    let vs = shader(&renderer, ShaderStage::Vertex);
    let layout = PipelineLayoutDesc::default();
    let desc = PipelineDesc {
        vertex_shader: &vs,
        pixel_shader: &vs,
        vertex_stride: 0,
        vertex_attributes: &[],
        culling_mode: CullingMode::Back,
        primitive_mode: PrimitiveMode::Triangles,
        enable_color_blending: false,
        target: TargetLayout::Swapchain,
        layout: &layout,
    };
    assert!(renderer.create_pipeline(&desc).is_err());
    assert!(renderer.create_pipeline(&desc).is_ok());
}

// ============================================================================
// Command lists and queue
// ============================================================================

#[test]
fn test_command_list_records_and_submits() {
    let renderer = MockRenderer::new();
    let mut list = renderer.create_command_list(0).unwrap();
    list.begin().unwrap();
    list.begin_render_pass(
        &RenderTargetRef::Swapchain { image_index: 0 },
        &[ClearValue::Color([0.1, 0.1, 0.1, 1.0])],
    )
    .unwrap();
    list.draw(4, 0).unwrap();
    list.end_render_pass().unwrap();
    list.end().unwrap();

    let signal = renderer.create_semaphore().unwrap();
    renderer
        .submit(SubmitInfo { command_list: list.as_ref(), wait: None, signal: Some(signal), fence: None })
        .unwrap();

    let submissions = renderer.submissions();
    assert_eq!(submissions.len(), 1);
    match &submissions[0] {
        MockEvent::Submit { commands, signal: s, .. } => {
            assert_eq!(commands[0], MockCommand::Begin);
            assert_eq!(commands[1], MockCommand::BeginRenderPass { target: MockTarget::Swapchain(0), clear_count: 1 });
            assert_eq!(commands[2], MockCommand::Draw { vertex_count: 4 });
            assert_eq!(*s, Some(signal));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_acquire_out_of_date_once() {
    let renderer = MockRenderer::new();
    renderer.state.lock().acquire_out_of_date = true;
    let sem = renderer.create_semaphore().unwrap();
    assert_eq!(renderer.acquire_next_image(sem).unwrap(), AcquireResult::OutOfDate);
    assert_eq!(renderer.acquire_next_image(sem).unwrap(), AcquireResult::Image(0));
}

#[test]
fn test_headless_read_back() {
    let presenting = MockRenderer::new();
    assert!(presenting.read_back_frame().unwrap().is_none());

    let headless = MockRenderer::headless(4, 2);
    assert!(headless.is_headless());
    assert_eq!(headless.read_back_frame().unwrap().unwrap().len(), 4 * 2 * 4);

    headless.resize(8, 8).unwrap();
    assert_eq!(headless.surface_size(), (8, 8));
    assert_eq!(headless.read_back_frame().unwrap().unwrap().len(), 8 * 8 * 4);
}

#[test]
fn test_shader_compiler_rejects_empty_source() {
    let compiler = MockShaderCompiler;
    assert!(compiler.compile(ShaderStage::Vertex, "  ").is_err());
    assert!(!compiler.compile(ShaderStage::Pixel, "void main() {}").unwrap().is_empty());
}
