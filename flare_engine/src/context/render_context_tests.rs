use super::*;
use glam::Mat4;
use crate::error::Error;
use crate::frame::NoHooks;
use crate::program::{ProgramFlags, ShaderBufferInput, ShaderBufferKind};
use crate::renderer::mock_renderer::{MockRenderer, MockShaderCompiler};
use crate::renderer::{CullingMode, ShaderStages};
use crate::scene::FlatTransforms;

const SPIRV: [u32; 5] = [0x0723_0203, 0x0001_0000, 0, 1, 0];

struct Setup {
    context: RenderContext,
    transforms: Arc<FlatTransforms>,
    renderer: MockRenderer,
}

fn setup() -> Setup {
    let renderer = MockRenderer::new();
    let transforms = Arc::new(FlatTransforms::new());
    let context = RenderContext::new(Arc::new(renderer.clone()), transforms.clone(), Config::default())
        .unwrap()
        .with_shader_compiler(Arc::new(MockShaderCompiler));
    Setup { context, transforms, renderer }
}

fn program(context: &RenderContext, render_layer: u32) -> RenderProgram {
    let vs = context.generate_shader_spirv(ShaderStage::Vertex, &SPIRV).unwrap();
    let ps = context.generate_shader_spirv(ShaderStage::Pixel, &SPIRV).unwrap();
    let mut program = RenderProgram::new(vs, ps);
    program.render_layer = render_layer;
    program.shader_buffer_inputs = vec![
        ShaderBufferInput::new(0, ShaderBufferKind::Model, ShaderStages::VERTEX),
        ShaderBufferInput::new(1, ShaderBufferKind::Texture, ShaderStages::PIXEL),
    ];
    program
}

fn triangle(context: &RenderContext) -> ModelHandle {
    context.generate_model(&[0; 36], 3, &[0, 1, 2], 12).unwrap()
}

fn sampler(context: &RenderContext) -> TextureSamplerHandle {
    let texture = context.generate_texture(1, 1, &[255; 4]).unwrap();
    context.generate_texture_sampler(texture, FilterMode::Linear, AddressMode::Repeat).unwrap()
}

// ============================================================================
// Shaders & programs
// ============================================================================

#[test]
fn test_source_shaders_need_a_compiler() {
    let renderer = MockRenderer::new();
    let context = RenderContext::new(
        Arc::new(renderer),
        Arc::new(FlatTransforms::new()),
        Config::default(),
    ).unwrap();

    assert!(matches!(context.generate_vertex_shader("void main() {}"), Err(Error::InitializationFailed(_))));
    assert!(context.generate_shader_spirv(ShaderStage::Vertex, &SPIRV).is_ok());
}

#[test]
fn test_compiler_errors_propagate() {
    let s = setup();
    assert!(s.context.generate_pixel_shader("void main() {}").is_ok());
    assert!(matches!(s.context.generate_pixel_shader("   "), Err(Error::InvalidResource(_))));
}

#[test]
fn test_builtin_programs_own_their_shaders() {
    let s = setup();
    let sources = BuiltinShaderSources {
        quad_vertex: "quad",
        directional_light: "directional",
        point_light: "point",
        spot_light: "spot",
        post: "post",
    };
    let builtins = s.context.register_builtin_programs(&sources).unwrap();

    assert_eq!(s.context.registry().program_count(), 4);
    assert_eq!(s.context.registry().shader_count(), 8);
    assert_eq!(builtins.for_light(LightKind::Spot), builtins.spot_light);

    let post = s.context.get_program(builtins.post).unwrap();
    assert!(post.flags.contains(ProgramFlags::DESTROY_SHADERS));
    s.context.destroy_program(builtins.post).unwrap();
    assert_eq!(s.context.registry().shader_count(), 6);
}

#[test]
fn test_set_program_invalidates_only_on_state_change() {
    let s = setup();
    let description = program(&s.context, 1);
    let material = s.context.generate_program(description.clone()).unwrap();
    s.context.generate_camera(s.transforms.insert(Mat4::IDENTITY));
    s.context.render_frame(&NoHooks, None).unwrap();
    assert_eq!(s.context.pipelines().len(), 1);

    let mut same_state = description.clone();
    same_state.flags = ProgramFlags::DESTROY_SHADERS;
    s.context.set_program(material, same_state).unwrap();
    assert_eq!(s.context.pipelines().len(), 1);

    let mut culled = description.clone();
    culled.culling_mode = CullingMode::Front;
    s.context.set_program(material, culled).unwrap();
    assert!(s.context.pipelines().is_empty());

    s.context.render_frame(&NoHooks, None).unwrap();
    let mut moved = description;
    moved.culling_mode = CullingMode::Front;
    moved.render_layer = 0b10;
    s.context.set_program(material, moved).unwrap();
    assert!(s.context.pipelines().is_empty());
}

#[test]
fn test_program_texture_needs_live_sampler() {
    let s = setup();
    let material = s.context.generate_program(program(&s.context, 1)).unwrap();
    let sampler = sampler(&s.context);

    s.context.set_program_texture(material, 1, sampler).unwrap();
    assert!(matches!(
        s.context.set_program_texture(material, 0, sampler),
        Err(Error::BindingNotFound(_))
    ));

    s.context.destroy_texture_sampler(sampler).unwrap();
    assert!(s.context.registry().textures(material).unwrap().bindings.is_empty());
    assert!(matches!(
        s.context.set_program_texture(material, 1, sampler),
        Err(Error::InvalidHandle(_))
    ));
}

// ============================================================================
// Cameras
// ============================================================================

#[test]
fn test_destroy_camera_drops_its_pipelines() {
    let s = setup();
    s.context.generate_program(program(&s.context, 1)).unwrap();
    let a = s.context.generate_camera(s.transforms.insert(Mat4::IDENTITY));
    s.context.generate_camera(s.transforms.insert(Mat4::IDENTITY));
    s.context.render_frame(&NoHooks, None).unwrap();
    assert_eq!(s.context.pipelines().len(), 2);

    s.context.destroy_camera(a).unwrap();
    assert_eq!(s.context.pipelines().len(), 1);
    assert!(matches!(s.context.get_camera(a), Err(Error::InvalidHandle(_))));
}

#[test]
fn test_set_camera_layer_change_drops_pipelines() {
    let s = setup();
    s.context.generate_program(program(&s.context, u32::MAX)).unwrap();
    let camera = s.context.generate_camera(s.transforms.insert(Mat4::IDENTITY));
    s.context.render_frame(&NoHooks, None).unwrap();

    let mut buffer = s.context.get_camera(camera).unwrap();
    buffer.fov = 1.0;
    s.context.set_camera(camera, buffer).unwrap();
    assert_eq!(s.context.pipelines().len(), 1);

    buffer.render_layer = 0b100;
    s.context.set_camera(camera, buffer).unwrap();
    assert!(s.context.pipelines().is_empty());
}

#[test]
fn test_camera_target_must_be_live() {
    let s = setup();
    let camera = s.context.generate_camera(s.transforms.insert(Mat4::IDENTITY));
    let mut buffer = s.context.get_camera(camera).unwrap();
    buffer.render_texture = Some(RenderTextureHandle::from_raw(9));
    assert!(matches!(s.context.set_camera(camera, buffer), Err(Error::InvalidHandle(_))));
}

#[test]
fn test_screen_to_world_round_trip() {
    let s = setup();
    let eye = Mat4::from_translation(Vec3::new(1.0, 2.0, 5.0));
    let camera = s.context.generate_camera(s.transforms.insert(eye));
    let size = Vec2::new(800.0, 600.0);

    let point = Vec3::new(0.5, 1.5, -3.0);
    let screen = s.context.world_to_screen(camera, point, size).unwrap();
    let back = s.context.screen_to_world(camera, screen, size).unwrap();
    assert!((back - point).length() < 1e-3, "{:?} != {:?}", back, point);
}

// ============================================================================
// Lights
// ============================================================================

#[test]
fn test_light_tables_are_independent() {
    let s = setup();
    let transform = s.transforms.insert(Mat4::IDENTITY);
    let sun = s.context.generate_directional_light(transform);
    let lamp = s.context.generate_point_light(transform);

    let mut buffer = s.context.get_point_light(lamp).unwrap();
    buffer.radius = 12.0;
    s.context.set_point_light(lamp, buffer).unwrap();
    assert_eq!(s.context.get_point_light(lamp).unwrap().radius, 12.0);

    s.context.destroy_directional_light(sun).unwrap();
    assert!(s.context.get_point_light(lamp).is_ok());
    assert!(s.context.destroy_directional_light(sun).is_err());
    assert_eq!(s.context.tables().spot_lights.len(), 0);
}

// ============================================================================
// Models, textures, render textures
// ============================================================================

#[test]
fn test_model_data_is_checked() {
    let s = setup();
    assert!(matches!(s.context.generate_model(&[0; 24], 3, &[0, 1, 2], 12), Err(Error::InvalidResource(_))));
    assert!(matches!(s.context.generate_model(&[0; 36], 3, &[0, 1, 3], 12), Err(Error::InvalidResource(_))));

    let model = triangle(&s.context);
    s.context.destroy_model(model).unwrap();
    assert!(matches!(s.context.destroy_model(model), Err(Error::InvalidHandle(_))));
}

#[test]
fn test_empty_models_are_rejected() {
    let s = setup();
    assert!(matches!(s.context.generate_model(&[], 0, &[0], 12), Err(Error::InvalidResource(_))));
    assert!(matches!(s.context.generate_model(&[0; 36], 3, &[], 12), Err(Error::InvalidResource(_))));
    assert!(matches!(s.context.generate_model(&[0; 36], 3, &[0, 1, 2], 0), Err(Error::InvalidResource(_))));
    assert_eq!(s.context.tables().models.len(), 0);
}

#[test]
fn test_destroy_model_in_use_is_rejected() {
    let s = setup();
    let material = s.context.generate_program(program(&s.context, 1)).unwrap();
    let model = triangle(&s.context);
    let mesh = s.context.generate_mesh_render_buffer(material, model, s.transforms.insert(Mat4::IDENTITY)).unwrap();
    s.context.generate_render_stack_entry(mesh).unwrap();

    assert!(matches!(s.context.destroy_model(model), Err(Error::InvalidResource(_))));
    assert!(s.context.tables().models.contains(model));

    s.context.destroy_mesh_render_buffer(mesh).unwrap();
    s.context.destroy_model(model).unwrap();
}

#[test]
fn test_render_texture_samplers_are_checked() {
    let s = setup();
    let target = s.context.generate_render_texture(2, 64, 64, false, false).unwrap();

    assert!(s.context.generate_render_texture_sampler(target, 1, FilterMode::Linear, AddressMode::ClampToEdge).is_ok());
    assert!(matches!(
        s.context.generate_render_texture_sampler(target, 2, FilterMode::Linear, AddressMode::ClampToEdge),
        Err(Error::InvalidResource(_))
    ));
    assert!(matches!(
        s.context.generate_render_texture_depth_sampler(target, FilterMode::Nearest, AddressMode::ClampToEdge),
        Err(Error::InvalidResource(_))
    ));
}

#[test]
fn test_resize_render_texture() {
    let s = setup();
    let target = s.context.generate_render_texture(1, 64, 32, true, true).unwrap();
    let epoch = s.context.tables().resize_epoch();

    s.context.resize_render_texture(target, 128, 96).unwrap();
    assert_eq!(s.context.render_texture_width(target).unwrap(), 128);
    assert_eq!(s.context.render_texture_height(target).unwrap(), 96);
    assert!(s.context.render_texture_has_depth(target).unwrap());
    assert_eq!(s.context.render_texture_texture_count(target).unwrap(), 1);
    assert_eq!(s.context.tables().resize_epoch(), epoch + 1);
}

#[test]
fn test_render_texture_in_use_is_not_destroyed() {
    let s = setup();
    let target = s.context.generate_render_texture(1, 64, 64, false, false).unwrap();
    let camera = s.context.generate_camera(s.transforms.insert(Mat4::IDENTITY));
    let mut buffer = s.context.get_camera(camera).unwrap();
    buffer.render_texture = Some(target);
    s.context.set_camera(camera, buffer).unwrap();

    assert!(s.context.destroy_render_texture(target).is_err());
    s.context.destroy_camera(camera).unwrap();
    s.context.destroy_render_texture(target).unwrap();
}

// ============================================================================
// Render stacks
// ============================================================================

#[test]
fn test_mesh_render_needs_live_material_and_model() {
    let s = setup();
    let transform = s.transforms.insert(Mat4::IDENTITY);
    let model = triangle(&s.context);

    let dead = ProgramHandle::from_raw(42);
    assert!(matches!(
        s.context.generate_mesh_render_buffer(dead, model, transform),
        Err(Error::InvalidHandle(_))
    ));
}

#[test]
fn test_render_stack_entries() {
    let s = setup();
    let material = s.context.generate_program(program(&s.context, 1)).unwrap();
    let model = triangle(&s.context);
    let a = s.context.generate_mesh_render_buffer(material, model, s.transforms.insert(Mat4::IDENTITY)).unwrap();
    let b = s.context.generate_mesh_render_buffer(material, model, s.transforms.insert(Mat4::IDENTITY)).unwrap();

    s.context.generate_render_stack_entry(a).unwrap();
    s.context.generate_render_stack_entry(b).unwrap();
    assert!(s.context.generate_render_stack_entry(a).is_err());
    assert_eq!(s.context.render_stack_count(), 1);

    s.context.destroy_render_stack_entry(a).unwrap();
    assert!(s.context.destroy_render_stack_entry(a).is_err());
    assert_eq!(s.context.render_stack_count(), 1);

    // Destroying the buffer also unstacks it
    s.context.destroy_mesh_render_buffer(b).unwrap();
    assert_eq!(s.context.render_stack_count(), 0);
}

#[test]
fn test_destroy_program_drops_its_stacks() {
    let s = setup();
    let material = s.context.generate_program(program(&s.context, 1)).unwrap();
    let model = triangle(&s.context);
    let mesh = s.context.generate_mesh_render_buffer(material, model, s.transforms.insert(Mat4::IDENTITY)).unwrap();
    s.context.generate_render_stack_entry(mesh).unwrap();

    s.context.destroy_program(material).unwrap();
    assert_eq!(s.context.render_stack_count(), 0);
    assert!(s.context.destroy_render_stack_entry(mesh).is_err());
}

#[test]
fn test_destroyed_program_leaves_no_pipeline_for_its_slot() {
    let s = setup();
    let mut first = program(&s.context, 1);
    first.flags = ProgramFlags::DESTROY_SHADERS;
    first.culling_mode = CullingMode::Back;
    let material = s.context.generate_program(first.clone()).unwrap();
    s.context.generate_camera(s.transforms.insert(Mat4::IDENTITY));
    s.context.render_frame(&NoHooks, None).unwrap();
    assert_eq!(s.context.pipelines().len(), 1);

    assert!(matches!(s.context.destroy_shader(first.vertex_shader), Err(Error::InvalidResource(_))));
    s.context.destroy_program(material).unwrap();
    assert!(s.context.pipelines().is_empty());
    assert_eq!(s.context.registry().shader_count(), 0);

    let mut replacement = program(&s.context, 1);
    replacement.culling_mode = CullingMode::None;
    let reused = s.context.generate_program(replacement).unwrap();
    assert_eq!(reused, material);

    s.context.render_frame(&NoHooks, None).unwrap();
    let built = s.renderer.state.lock().pipelines.last().unwrap().culling_mode;
    assert_eq!(built, CullingMode::None);
}

// ============================================================================
// Frames
// ============================================================================

#[test]
fn test_render_frame_draws_stacked_meshes() {
    let s = setup();
    let material = s.context.generate_program(program(&s.context, 1)).unwrap();
    let model = triangle(&s.context);
    for _ in 0..3 {
        let mesh = s.context.generate_mesh_render_buffer(material, model, s.transforms.insert(Mat4::IDENTITY)).unwrap();
        s.context.generate_render_stack_entry(mesh).unwrap();
    }
    s.context.generate_camera(s.transforms.insert(Mat4::IDENTITY));

    assert_eq!(
        s.context.render_frame(&NoHooks, None).unwrap(),
        FrameOutcome::Submitted { command_lists: 1 }
    );
    assert_eq!(s.context.frame_counter(), 1);
    assert_eq!(s.renderer.submissions().len(), 1);
}

#[test]
fn test_empty_scene_skips_frames() {
    let s = setup();
    assert_eq!(s.context.render_frame(&NoHooks, None).unwrap(), FrameOutcome::Skipped);
    assert_eq!(s.context.frame_counter(), 0);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = Config { max_flight_frames: 0, ..Config::default() };
    let result = RenderContext::new(Arc::new(MockRenderer::new()), Arc::new(FlatTransforms::new()), config);
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}
