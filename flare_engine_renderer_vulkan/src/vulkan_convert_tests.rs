use super::*;
use flare_engine::flare::Error;
use flare_engine::flare::DebugSeverity;

// ============================================================================
// FORMATS
// ============================================================================

#[test]
fn test_color_format_follows_hdr_flag() {
    assert_eq!(color_format(false), vk::Format::R8G8B8A8_UNORM);
    assert_eq!(color_format(true), vk::Format::R16G16B16A16_SFLOAT);
}

#[test]
fn test_vertex_formats_cover_one_to_four_components() {
    assert_eq!(vertex_format(VertexType::Float, 3).unwrap(), vk::Format::R32G32B32_SFLOAT);
    assert_eq!(vertex_format(VertexType::Int, 1).unwrap(), vk::Format::R32_SINT);
    assert_eq!(vertex_format(VertexType::UInt, 4).unwrap(), vk::Format::R32G32B32A32_UINT);
}

#[test]
fn test_vertex_format_rejects_bad_component_count() {
    assert!(matches!(vertex_format(VertexType::Float, 0), Err(Error::InvalidResource(_))));
    assert!(matches!(vertex_format(VertexType::UInt, 5), Err(Error::InvalidResource(_))));
}

// ============================================================================
// STAGES AND STATE
// ============================================================================

#[test]
fn test_pixel_stage_maps_to_fragment() {
    assert_eq!(shader_stage_to_vk(ShaderStage::Pixel), vk::ShaderStageFlags::FRAGMENT);
    assert_eq!(stages_to_vk(ShaderStages::ALL), vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
    assert_eq!(stages_to_vk(ShaderStages::empty()), vk::ShaderStageFlags::empty());
}

#[test]
fn test_culling_both_is_front_and_back() {
    assert_eq!(cull_mode_to_vk(CullingMode::Both), vk::CullModeFlags::FRONT_AND_BACK);
    assert_eq!(cull_mode_to_vk(CullingMode::None), vk::CullModeFlags::NONE);
}

#[test]
fn test_binding_types() {
    assert_eq!(binding_type_to_vk(BindingType::UniformBuffer), vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(
        binding_type_to_vk(BindingType::CombinedImageSampler),
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
    );
}

#[test]
fn test_clear_values() {
    let color = clear_value_to_vk(ClearValue::Color([0.1, 0.2, 0.3, 1.0]));
    assert_eq!(unsafe { color.color.float32 }, [0.1, 0.2, 0.3, 1.0]);

    let depth = clear_value_to_vk(ClearValue::DepthStencil { depth: 1.0, stencil: 0 });
    assert_eq!(unsafe { depth.depth_stencil.depth }, 1.0);
}

// ============================================================================
// SET LAYOUT GAPS
// ============================================================================

#[test]
fn test_dense_set_slots_fills_gaps() {
    assert_eq!(dense_set_slots(&[0, 2]).unwrap(), vec![Some(0), None, Some(1)]);
    assert_eq!(dense_set_slots(&[1]).unwrap(), vec![None, Some(0)]);
    assert!(dense_set_slots(&[]).unwrap().is_empty());
}

#[test]
fn test_dense_set_slots_rejects_unordered_indices() {
    assert!(dense_set_slots(&[2, 1]).is_err());
    assert!(dense_set_slots(&[1, 1]).is_err());
}

#[test]
fn test_full_blit_covers_both_extents() {
    let blit = full_blit(vk::Extent2D { width: 64, height: 32 }, vk::Extent2D { width: 800, height: 600 });
    assert_eq!(blit.src_offsets[1], vk::Offset3D { x: 64, y: 32, z: 1 });
    assert_eq!(blit.dst_offsets[1], vk::Offset3D { x: 800, y: 600, z: 1 });
}

#[test]
fn test_downcast_reports_foreign_objects() {
    let value: u32 = 5;
    assert_eq!(*downcast::<u32>(&value, "value").unwrap(), 5);
    assert!(matches!(downcast::<u64>(&value, "value"), Err(Error::InvalidResource(_))));
}

#[test]
fn test_debug_severity_flags() {
    use crate::debug::severity_flags;
    assert_eq!(severity_flags(DebugSeverity::ErrorsOnly), vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
    assert!(severity_flags(DebugSeverity::All).contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
    assert!(!severity_flags(DebugSeverity::ErrorsAndWarnings).contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
}
