use super::*;
use crate::error::Error;
use crate::handles::ShaderHandle;
use crate::program::BuiltinProgram;
use crate::renderer::mock_renderer::{MockRenderer, MockWrite};
use crate::renderer::{TextureDesc, SamplerDesc, SamplerSource, FilterMode, AddressMode};

fn light_bindings(renderer: &MockRenderer) -> ProgramBindings {
    let program = BuiltinProgram::DirectionalLight
        .describe(ShaderHandle::from_raw(0), ShaderHandle::from_raw(1));
    ProgramBindings::new(renderer, &program).unwrap()
}

fn sampler(renderer: &MockRenderer) -> Arc<dyn Sampler> {
    let texture = renderer.create_texture(TextureDesc { width: 1, height: 1, data: &[0; 4] }).unwrap();
    renderer
        .create_sampler(SamplerDesc {
            source: SamplerSource::Texture(texture),
            filter: FilterMode::Linear,
            address: AddressMode::Repeat,
        })
        .unwrap()
}

#[test]
fn test_layout_lists_sets_in_order() {
    let renderer = MockRenderer::new();
    let bindings = light_bindings(&renderer);

    let sets: Vec<u32> = bindings.layout().set_layouts.iter().map(|(i, _)| *i).collect();
    assert_eq!(sets, vec![0, 1, 2]);
    assert!(bindings.layout().push_constant.is_none());
    assert_eq!(bindings.push_layouts().len(), 2);
}

#[test]
fn test_program_without_textures_has_no_static_set() {
    let renderer = MockRenderer::new();
    let program = RenderProgram::new(ShaderHandle::from_raw(0), ShaderHandle::from_raw(1));
    let bindings = ProgramBindings::new(&renderer, &program).unwrap();

    let textures = ProgramTextures { version: 1, bindings: Vec::new() };
    let set = bindings.static_set(&renderer, &textures, 0, |_| unreachable!()).unwrap();
    assert!(set.is_none());
}

#[test]
fn test_static_set_is_cached_until_version_changes() {
    let renderer = MockRenderer::new();
    let bindings = light_bindings(&renderer);
    let shared = sampler(&renderer);
    let resolve = |_: TextureSamplerHandle| -> Result<Arc<dyn Sampler>> { Ok(Arc::clone(&shared)) };

    let textures = ProgramTextures {
        version: 3,
        bindings: vec![(0, TextureSamplerHandle::from_raw(0)), (2, TextureSamplerHandle::from_raw(1))],
    };
    let first = bindings.static_set(&renderer, &textures, 0, resolve).unwrap().unwrap();
    let again = bindings.static_set(&renderer, &textures, 0, resolve).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    let writes = renderer.state.lock().binding_writes.clone();
    assert_eq!(writes.len(), 2);
    assert!(matches!(writes[1], (_, 2, MockWrite::Sampler(_))));

    let bumped = ProgramTextures { version: 4, ..textures.clone() };
    let rebuilt = bindings.static_set(&renderer, &bumped, 0, resolve).unwrap().unwrap();
    assert!(!Arc::ptr_eq(&first, &rebuilt));

    let resized = bindings.static_set(&renderer, &bumped, 1, resolve).unwrap().unwrap();
    assert!(!Arc::ptr_eq(&rebuilt, &resized));
}

#[test]
fn test_missing_sampler_is_skipped() {
    let renderer = MockRenderer::new();
    let bindings = light_bindings(&renderer);
    let textures = ProgramTextures { version: 1, bindings: vec![(0, TextureSamplerHandle::from_raw(9))] };

    let set = bindings
        .static_set(&renderer, &textures, 0, |_| Err(Error::InvalidHandle("gone".into())))
        .unwrap();
    assert!(set.is_some());
    assert!(renderer.state.lock().binding_writes.is_empty());
}

#[test]
fn test_invalid_program_fails_classification() {
    let renderer = MockRenderer::new();
    let mut program = RenderProgram::new(ShaderHandle::from_raw(0), ShaderHandle::from_raw(1));
    program.shader_buffer_inputs.push(
        crate::program::ShaderBufferInput::new(0, crate::program::ShaderBufferKind::Texture,
            crate::renderer::ShaderStages::PIXEL).in_set(2),
    );
    assert!(ProgramBindings::new(&renderer, &program).is_err());
}
