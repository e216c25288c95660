/// Pipeline - graphics pipeline and its layout

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::flare::render::{Pipeline as RendererPipeline, PipelineDesc, TargetLayout};
use flare_engine::engine_err;

use crate::vulkan_binding::{create_set_layout, BindingLayout};
use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{
    cull_mode_to_vk, dense_set_slots, downcast, primitive_to_vk, stages_to_vk,
    vertex_format,
};
use crate::vulkan_shader::Shader;

pub struct Pipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    /// Empty set layouts filling gaps between declared set indices
    gap_layouts: Vec<vk::DescriptorSetLayout>,
    target: TargetLayout,
}

impl Pipeline {
    /// Build a pipeline for `render_pass`, which must match `desc.target`
    pub fn new(ctx: Arc<GpuContext>, desc: &PipelineDesc, render_pass: vk::RenderPass) -> Result<Self> {
        let vertex = downcast::<Shader>(desc.vertex_shader.as_any(), "Vertex shader")?;
        let pixel = downcast::<Shader>(desc.pixel_shader.as_any(), "Pixel shader")?;

        vertex.reflection.check_layout(desc.vertex_shader.stage(), desc.layout);
        pixel.reflection.check_layout(desc.pixel_shader.stage(), desc.layout);

        // ===== LAYOUT =====

        let indices: Vec<u32> = desc.layout.set_layouts.iter().map(|(index, _)| *index).collect();
        let slots = dense_set_slots(&indices)?;

        let mut gap_layouts = Vec::new();
        let mut set_layouts = Vec::with_capacity(slots.len());
        for slot in &slots {
            match slot {
                Some(position) => {
                    let (_, layout) = &desc.layout.set_layouts[*position];
                    set_layouts.push(downcast::<BindingLayout>(layout.as_any(), "BindingLayout")?.layout);
                }
                None => {
                    let empty = create_set_layout(&ctx.device, &[])?;
                    gap_layouts.push(empty);
                    set_layouts.push(empty);
                }
            }
        }

        let push_ranges: Vec<vk::PushConstantRange> = desc.layout.push_constant
            .filter(|range| range.size > 0)
            .map(|range| vk::PushConstantRange {
                stage_flags: stages_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .into_iter()
            .collect();

        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_ranges);

        let layout = unsafe { ctx.device.create_pipeline_layout(&layout_info, None) };
        let layout = match layout {
            Ok(layout) => layout,
            Err(e) => {
                destroy_set_layouts(&ctx.device, &gap_layouts);
                return Err(engine_err!("flare::vulkan", "Failed to create pipeline layout: {:?}", e));
            }
        };

        match Self::create_pipeline(&ctx, desc, vertex, pixel, layout, render_pass) {
            Ok(pipeline) => Ok(Self { ctx, pipeline, layout, gap_layouts, target: desc.target }),
            Err(e) => {
                unsafe { ctx.device.destroy_pipeline_layout(layout, None) };
                destroy_set_layouts(&ctx.device, &gap_layouts);
                Err(e)
            }
        }
    }

    fn create_pipeline(
        ctx: &GpuContext,
        desc: &PipelineDesc,
        vertex: &Shader,
        pixel: &Shader,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> Result<vk::Pipeline> {
        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex.module)
                .name(&vertex.entry_point),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(pixel.module)
                .name(&pixel.entry_point),
        ];

        // ===== VERTEX INPUT =====

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = if desc.vertex_stride > 0 {
            vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: u32::from(desc.vertex_stride),
                input_rate: vk::VertexInputRate::VERTEX,
            }]
        } else {
            Vec::new()
        };

        let vertex_attributes = if desc.vertex_stride > 0 {
            desc.vertex_attributes.iter()
                .map(|attrib| Ok(vk::VertexInputAttributeDescription {
                    location: u32::from(attrib.location),
                    binding: 0,
                    format: vertex_format(attrib.ty, attrib.count)?,
                    offset: u32::from(attrib.offset),
                }))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(primitive_to_vk(desc.primitive_mode))
            .primitive_restart_enable(false);

        // Viewport and scissor are set per camera
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(cull_mode_to_vk(desc.culling_mode))
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // ===== TARGET =====

        let (color_count, has_depth) = match desc.target {
            TargetLayout::Swapchain => (1, false),
            TargetLayout::Texture { color_count, depth, .. } => (color_count as usize, depth),
        };

        let blend = if desc.enable_color_blending {
            vk::PipelineColorBlendAttachmentState::default()
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .alpha_blend_op(vk::BlendOp::ADD)
                .color_write_mask(vk::ColorComponentFlags::RGBA)
        } else {
            vk::PipelineColorBlendAttachmentState::default()
                .blend_enable(false)
                .color_write_mask(vk::ColorComponentFlags::RGBA)
        };
        let blend_attachments = vec![blend; color_count];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(&blend_attachments);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(has_depth)
            .depth_write_enable(has_depth)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL);

        let mut create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);
        if has_depth {
            create_info = create_info.depth_stencil_state(&depth_stencil);
        }

        let pipelines = unsafe {
            ctx.device.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| engine_err!("flare::vulkan", "Failed to create graphics pipeline: {:?}", e))?
        };

        pipelines.into_iter().next()
            .ok_or_else(|| engine_err!("flare::vulkan", "Pipeline creation returned no pipeline"))
    }
}

fn destroy_set_layouts(device: &ash::Device, layouts: &[vk::DescriptorSetLayout]) {
    for &layout in layouts {
        unsafe { device.destroy_descriptor_set_layout(layout, None) };
    }
}

impl RendererPipeline for Pipeline {
    fn target(&self) -> TargetLayout {
        self.target
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
        destroy_set_layouts(&self.ctx.device, &self.gap_layouts);
    }
}
