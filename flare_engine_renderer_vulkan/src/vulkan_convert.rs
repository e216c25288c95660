/// Conversions from engine descriptors to Vulkan enums and structs

use ash::vk;
use std::any::Any;
use flare_engine::flare::Result;
use flare_engine::flare::render::{
    AddressMode, BindingType, ClearValue, CullingMode, FilterMode, PrimitiveMode,
    ShaderStage, ShaderStages, VertexType,
};
use flare_engine::engine_err;

/// Color format of RGBA8 render texture attachments and uploaded textures
pub const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
/// Color format of HDR render texture attachments
pub const HDR_COLOR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

pub fn color_format(hdr: bool) -> vk::Format {
    if hdr { HDR_COLOR_FORMAT } else { COLOR_FORMAT }
}

pub fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Pixel => vk::ShaderStageFlags::FRAGMENT,
    }
}

pub fn stages_to_vk(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::PIXEL) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    flags
}

pub fn binding_type_to_vk(binding_type: BindingType) -> vk::DescriptorType {
    match binding_type {
        BindingType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        BindingType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

pub fn cull_mode_to_vk(mode: CullingMode) -> vk::CullModeFlags {
    match mode {
        CullingMode::None => vk::CullModeFlags::NONE,
        CullingMode::Front => vk::CullModeFlags::FRONT,
        CullingMode::Back => vk::CullModeFlags::BACK,
        CullingMode::Both => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub fn primitive_to_vk(mode: PrimitiveMode) -> vk::PrimitiveTopology {
    match mode {
        PrimitiveMode::Triangles => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveMode::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub fn filter_to_vk(filter: FilterMode) -> vk::Filter {
    match filter {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

pub fn address_to_vk(address: AddressMode) -> vk::SamplerAddressMode {
    match address {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
    }
}

/// Vertex attribute format for `count` 32-bit components of type `ty`
pub fn vertex_format(ty: VertexType, count: u16) -> Result<vk::Format> {
    use vk::Format as F;
    let format = match (ty, count) {
        (VertexType::Float, 1) => F::R32_SFLOAT,
        (VertexType::Float, 2) => F::R32G32_SFLOAT,
        (VertexType::Float, 3) => F::R32G32B32_SFLOAT,
        (VertexType::Float, 4) => F::R32G32B32A32_SFLOAT,
        (VertexType::Int, 1) => F::R32_SINT,
        (VertexType::Int, 2) => F::R32G32_SINT,
        (VertexType::Int, 3) => F::R32G32B32_SINT,
        (VertexType::Int, 4) => F::R32G32B32A32_SINT,
        (VertexType::UInt, 1) => F::R32_UINT,
        (VertexType::UInt, 2) => F::R32G32_UINT,
        (VertexType::UInt, 3) => F::R32G32B32_UINT,
        (VertexType::UInt, 4) => F::R32G32B32A32_UINT,
        _ => {
            return Err(engine_err!("flare::vulkan", InvalidResource:
                "Unsupported vertex attribute: {:?} x {}", ty, count));
        }
    };
    Ok(format)
}

pub fn clear_value_to_vk(value: ClearValue) -> vk::ClearValue {
    match value {
        ClearValue::Color(color) => vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

/// Map ascending set indices to a dense layout list.
///
/// Entry `i` of the result is the position in `indices` of set `i`, or
/// `None` for a gap that needs an empty layout.
pub fn dense_set_slots(indices: &[u32]) -> Result<Vec<Option<usize>>> {
    let Some(&last) = indices.last() else {
        return Ok(Vec::new());
    };

    if indices.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(engine_err!("flare::vulkan", InvalidResource:
            "Binding set indices must be strictly ascending: {:?}", indices));
    }

    let mut slots = vec![None; last as usize + 1];
    for (position, &index) in indices.iter().enumerate() {
        slots[index as usize] = Some(position);
    }
    Ok(slots)
}

/// Whole-image blit from `src` to `dst`, scaling to fit
pub fn full_blit(src: vk::Extent2D, dst: vk::Extent2D) -> vk::ImageBlit {
    let layers = vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    };
    vk::ImageBlit {
        src_subresource: layers,
        src_offsets: [
            vk::Offset3D { x: 0, y: 0, z: 0 },
            vk::Offset3D { x: src.width as i32, y: src.height as i32, z: 1 },
        ],
        dst_subresource: layers,
        dst_offsets: [
            vk::Offset3D { x: 0, y: 0, z: 0 },
            vk::Offset3D { x: dst.width as i32, y: dst.height as i32, z: 1 },
        ],
    }
}

pub fn subresource_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Downcast an engine trait object to the Vulkan type behind it
pub fn downcast<'a, T: 'static>(any: &'a dyn Any, what: &str) -> Result<&'a T> {
    any.downcast_ref::<T>()
        .ok_or_else(|| engine_err!("flare::vulkan", InvalidResource:
            "{} was not created by the Vulkan renderer", what))
}

#[cfg(test)]
#[path = "vulkan_convert_tests.rs"]
mod tests;
