/// CommandList - records one camera's pass into a primary command buffer

use ash::vk;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use flare_engine::flare::Result;
use flare_engine::flare::render::{
    BindingSet as RendererBindingSet, BoundResource, ClearValue, CommandList as RendererCommandList,
    Model as RendererModel, Pipeline as RendererPipeline, Rect2D, RenderTargetRef,
    RenderTexture as RendererRenderTexture, ShaderStages, Viewport,
};
use flare_engine::{engine_bail, engine_err};

use crate::vulkan_binding::BindingSet;
use crate::vulkan_command_pools::CommandPools;
use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{clear_value_to_vk, downcast, full_blit, stages_to_vk};
use crate::vulkan_image::record_layout_transition;
use crate::vulkan_model::Model;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_texture::RenderTexture;
use crate::vulkan_surface::SurfaceTargets;

pub struct CommandList {
    ctx: Arc<GpuContext>,
    command_buffer: vk::CommandBuffer,
    surface: Arc<RwLock<SurfaceTargets>>,
    pools: Arc<CommandPools>,
    flight_frame: usize,
    /// Handed to the pools on drop, released when the flight frame resets
    bound: Vec<BoundResource>,
    recording: bool,
    in_render_pass: bool,
}

impl CommandList {
    pub fn new(
        ctx: Arc<GpuContext>,
        pools: Arc<CommandPools>,
        flight_frame: usize,
        surface: Arc<RwLock<SurfaceTargets>>,
    ) -> Result<Self> {
        let command_buffer = pools.acquire(flight_frame)?;
        Ok(Self {
            ctx,
            command_buffer,
            surface,
            pools,
            flight_frame,
            bound: Vec::new(),
            recording: false,
            in_render_pass: false,
        })
    }

    pub(crate) fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    fn check_recording(&self, what: &str) -> Result<()> {
        if !self.recording {
            engine_bail!("flare::vulkan", "{} called on a command list that is not recording", what);
        }
        Ok(())
    }

    fn keep_target(&mut self, target: &RenderTargetRef) {
        if let RenderTargetRef::Texture(texture) = target {
            self.bound.push(BoundResource::RenderTexture(Arc::clone(texture)));
        }
    }

    fn pipeline_layout(pipeline: &Arc<dyn RendererPipeline>) -> Result<vk::PipelineLayout> {
        Ok(downcast::<Pipeline>(pipeline.as_any(), "Pipeline")?.layout)
    }

    /// Image, extent, layout before and layout after a blit writes `dst`
    fn blit_destination(&self, dst: &RenderTargetRef) -> Result<(vk::Image, vk::Extent2D, vk::ImageLayout)> {
        match dst {
            RenderTargetRef::Swapchain { image_index } => {
                let surface = self.surface.read();
                Ok((surface.image(*image_index)?, surface.extent, surface.resting_layout))
            }
            RenderTargetRef::Texture(target) => {
                let (image, extent) = downcast::<RenderTexture>(target.as_any(), "RenderTexture")?.blit_source()?;
                Ok((image, extent, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL))
            }
        }
    }
}

impl RendererCommandList for CommandList {
    fn begin(&mut self) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.ctx.device.begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }
        self.recording = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.check_recording("end")?;
        if self.in_render_pass {
            engine_bail!("flare::vulkan", "end called inside a render pass");
        }

        unsafe {
            self.ctx.device.end_command_buffer(self.command_buffer)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to end command buffer: {:?}", e))?;
        }
        self.recording = false;
        Ok(())
    }

    fn begin_render_pass(&mut self, target: &RenderTargetRef, clear_values: &[ClearValue]) -> Result<()> {
        self.check_recording("begin_render_pass")?;

        let (render_pass, framebuffer, extent, attachments) = match target {
            RenderTargetRef::Swapchain { image_index } => {
                let surface = self.surface.read();
                (surface.render_pass, surface.framebuffer(*image_index)?, surface.extent, 1)
            }
            RenderTargetRef::Texture(texture) => {
                let texture = downcast::<RenderTexture>(texture.as_any(), "RenderTexture")?;
                let (framebuffer, extent) = texture.framebuffer();
                (texture.render_pass(), framebuffer, extent, texture.attachment_count())
            }
        };

        if clear_values.len() < attachments {
            engine_bail!("flare::vulkan", InvalidResource:
                "Render pass has {} attachments but {} clear values were given", attachments, clear_values.len());
        }

        let clears: Vec<vk::ClearValue> = clear_values[..attachments].iter()
            .map(|&value| clear_value_to_vk(value))
            .collect();

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent })
            .clear_values(&clears);

        unsafe {
            self.ctx.device.cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        self.keep_target(target);
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        if !self.in_render_pass {
            engine_bail!("flare::vulkan", "end_render_pass called outside a render pass");
        }
        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn RendererPipeline>) -> Result<()> {
        let vk_pipeline = downcast::<Pipeline>(pipeline.as_any(), "Pipeline")?.pipeline;
        unsafe {
            self.ctx.device.cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, vk_pipeline);
        }
        self.bound.push(BoundResource::Pipeline(Arc::clone(pipeline)));
        Ok(())
    }

    fn bind_binding_set(
        &mut self,
        pipeline: &Arc<dyn RendererPipeline>,
        set_index: u32,
        set: &Arc<dyn RendererBindingSet>,
    ) -> Result<()> {
        let layout = Self::pipeline_layout(pipeline)?;
        let vk_set = downcast::<BindingSet>(set.as_any(), "BindingSet")?.set;
        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                set_index,
                &[vk_set],
                &[],
            );
        }
        self.bound.push(BoundResource::BindingSet(Arc::clone(set)));
        Ok(())
    }

    fn push_constants(
        &mut self,
        pipeline: &Arc<dyn RendererPipeline>,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        let layout = Self::pipeline_layout(pipeline)?;
        unsafe {
            self.ctx.device.cmd_push_constants(self.command_buffer, layout, stages_to_vk(stages), offset, data);
        }
        Ok(())
    }

    fn bind_model(&mut self, model: &Arc<dyn RendererModel>) -> Result<()> {
        let buffers = downcast::<Model>(model.as_any(), "Model")?;
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffers.vertex_buffer.buffer], &[0]);
            if let Some(index_buffer) = &buffers.index_buffer {
                self.ctx.device.cmd_bind_index_buffer(self.command_buffer, index_buffer.buffer, 0, vk::IndexType::UINT32);
            }
        }
        self.bound.push(BoundResource::Model(Arc::clone(model)));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, vertex_offset, 0);
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0);
        }
        Ok(())
    }

    fn blit(&mut self, src: &Arc<dyn RendererRenderTexture>, dst: &RenderTargetRef) -> Result<()> {
        self.check_recording("blit")?;
        if self.in_render_pass {
            engine_bail!("flare::vulkan", "blit must be recorded outside a render pass");
        }

        let (src_image, src_extent) = downcast::<RenderTexture>(src.as_any(), "RenderTexture")?.blit_source()?;
        let (dst_image, dst_extent, dst_final) = self.blit_destination(dst)?;
        if src_image == dst_image {
            engine_bail!("flare::vulkan", InvalidResource: "blit source and destination are the same image");
        }

        let device = &self.ctx.device;
        let cb = self.command_buffer;
        let color = vk::ImageAspectFlags::COLOR;

        record_layout_transition(device, cb, src_image, color,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        // The whole destination is overwritten, its old content is discarded
        record_layout_transition(device, cb, dst_image, color,
            vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);

        unsafe {
            device.cmd_blit_image(
                cb,
                src_image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[full_blit(src_extent, dst_extent)],
                vk::Filter::LINEAR,
            );
        }

        record_layout_transition(device, cb, src_image, color,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        record_layout_transition(device, cb, dst_image, color,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL, dst_final);

        self.bound.push(BoundResource::RenderTexture(Arc::clone(src)));
        self.keep_target(dst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        self.pools.retain(self.flight_frame, &mut self.bound);
    }
}
