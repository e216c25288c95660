use super::*;
use crate::error::Error;
use crate::program::{ShaderBufferInput, ShaderBufferKind};
use crate::renderer::mock_renderer::{MockRenderer, MockShader};
use crate::renderer::{ShaderStage, ShaderStages, CullingMode};

const SWAPCHAIN: TargetLayout = TargetLayout::Swapchain;

fn program(registry: &ProgramRegistry, render_layer: u32) -> ProgramHandle {
    let vs = registry.add_shader(Arc::new(MockShader { id: 0, stage: ShaderStage::Vertex }));
    let ps = registry.add_shader(Arc::new(MockShader { id: 0, stage: ShaderStage::Pixel }));
    let mut program = RenderProgram::new(vs, ps);
    program.render_layer = render_layer;
    program.shader_buffer_inputs = vec![
        ShaderBufferInput::new(0, ShaderBufferKind::Model, ShaderStages::VERTEX),
        ShaderBufferInput::new(0, ShaderBufferKind::Camera, ShaderStages::ALL),
    ];
    registry.generate_program(program).unwrap()
}

fn camera(raw: u32) -> CameraHandle {
    CameraHandle::from_raw(raw)
}

#[test]
fn test_key_packs_camera_low_program_high() {
    let key = PipelineKey::new(camera(7), ProgramHandle::from_raw(3));
    assert_eq!(key.raw(), 7 | 3 << 32);
    assert_eq!(key.camera(), camera(7));
    assert_eq!(key.program(), ProgramHandle::from_raw(3));
}

#[test]
fn test_one_pipeline_per_intersecting_pair() {
    let renderer = MockRenderer::new();
    let registry = ProgramRegistry::new();
    let cache = PipelineCache::new(2, 8);

    let opaque = program(&registry, 0b01);
    let overlay = program(&registry, 0b10);
    let everywhere = program(&registry, 0b11);

    // Camera 0 sees layer 1, camera 1 sees layer 2, camera 2 sees nothing
    assert_eq!(cache.ensure(&renderer, &registry, camera(0), 0b01, SWAPCHAIN).unwrap(), 2);
    assert_eq!(cache.ensure(&renderer, &registry, camera(1), 0b10, SWAPCHAIN).unwrap(), 2);
    assert_eq!(cache.ensure(&renderer, &registry, camera(2), 0b100, SWAPCHAIN).unwrap(), 0);

    assert_eq!(cache.len(), 4);
    assert_eq!(renderer.pipeline_count(), 4);
    assert!(cache.get(camera(0), opaque).is_some());
    assert!(cache.get(camera(0), overlay).is_none());
    assert!(cache.get(camera(1), overlay).is_some());
    assert!(cache.get(camera(1), everywhere).is_some());
    assert!(cache.get(camera(2), everywhere).is_none());
}

#[test]
fn test_ensure_is_idempotent() {
    let renderer = MockRenderer::new();
    let registry = ProgramRegistry::new();
    let cache = PipelineCache::new(2, 8);
    program(&registry, u32::MAX);

    cache.ensure(&renderer, &registry, camera(0), 1, SWAPCHAIN).unwrap();
    assert_eq!(cache.ensure(&renderer, &registry, camera(0), 1, SWAPCHAIN).unwrap(), 0);
    assert_eq!(renderer.pipeline_count(), 1);
}

#[test]
fn test_cameras_share_program_bindings() {
    let renderer = MockRenderer::new();
    let registry = ProgramRegistry::new();
    let cache = PipelineCache::new(2, 8);
    let material = program(&registry, u32::MAX);

    cache.ensure(&renderer, &registry, camera(0), 1, SWAPCHAIN).unwrap();
    cache.ensure(&renderer, &registry, camera(1), 1, SWAPCHAIN).unwrap();

    let a = cache.get(camera(0), material).unwrap();
    let b = cache.get(camera(1), material).unwrap();
    assert!(Arc::ptr_eq(a.bindings(), b.bindings()));
    assert!(!std::ptr::eq(a.push_pools(), b.push_pools()));
    assert_eq!(a.push_pools().lock().flight_count(), 2);
}

#[test]
fn test_variants_are_built_per_target_layout() {
    let renderer = MockRenderer::new();
    let registry = ProgramRegistry::new();
    let cache = PipelineCache::new(1, 4);
    let material = program(&registry, u32::MAX);
    cache.ensure(&renderer, &registry, camera(0), 1, SWAPCHAIN).unwrap();

    let entry = cache.get(camera(0), material).unwrap();
    let gbuffer = TargetLayout::Texture { color_count: 4, depth: true, hdr: true };
    let first = entry.pipeline_for(&renderer, gbuffer).unwrap();
    let again = entry.pipeline_for(&renderer, gbuffer).unwrap();

    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(entry.variant_count(), 2);
    assert_eq!(renderer.pipeline_count(), 2);
    assert_eq!(renderer.state.lock().pipelines[1].target, gbuffer);
}

#[test]
fn test_pipeline_reflects_program_state() {
    let renderer = MockRenderer::new();
    let registry = ProgramRegistry::new();
    let cache = PipelineCache::new(1, 4);
    let material = program(&registry, u32::MAX);

    let mut changed = registry.program(material).unwrap();
    changed.culling_mode = CullingMode::Front;
    registry.set_program(material, changed).unwrap();
    cache.ensure(&renderer, &registry, camera(0), 1, SWAPCHAIN).unwrap();

    let info = renderer.state.lock().pipelines[0].clone();
    assert_eq!(info.culling_mode, CullingMode::Front);
    assert_eq!(info.push_constant_size, Some(128));
    assert_eq!(info.set_indices, vec![0]);
}

#[test]
fn test_invalidation_drops_entries() {
    let renderer = MockRenderer::new();
    let registry = ProgramRegistry::new();
    let cache = PipelineCache::new(2, 8);
    let a = program(&registry, u32::MAX);
    let b = program(&registry, u32::MAX);

    for cam in 0..3 {
        cache.ensure(&renderer, &registry, camera(cam), 1, SWAPCHAIN).unwrap();
    }
    assert_eq!(cache.len(), 6);

    assert_eq!(cache.invalidate_camera(camera(1)), 2);
    assert_eq!(cache.invalidate_program(a), 2);
    assert_eq!(cache.len(), 2);
    assert!(cache.get(camera(0), b).is_some());

    // A rebuilt program gets fresh entries
    assert_eq!(cache.ensure(&renderer, &registry, camera(0), 1, SWAPCHAIN).unwrap(), 1);

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_failed_build_leaves_no_entry() {
    let renderer = MockRenderer::new();
    let registry = ProgramRegistry::new();
    let cache = PipelineCache::new(2, 8);
    let material = program(&registry, u32::MAX);

    renderer.state.lock().fail_next_pipeline = true;
    assert!(matches!(
        cache.ensure(&renderer, &registry, camera(0), 1, SWAPCHAIN),
        Err(Error::BackendError(_))
    ));
    assert!(cache.get(camera(0), material).is_none());

    assert_eq!(cache.ensure(&renderer, &registry, camera(0), 1, SWAPCHAIN).unwrap(), 1);
}
