/// Frame orchestrator.
///
/// Runs once per frame on the render thread:
///
/// 1. collect the cameras sharing a render layer with at least one live
///    program (none: skip the frame without touching the GPU)
/// 2. wait the current sync slot, acquire the next image
/// 3. make sure every (camera, program) pipeline exists
/// 4. build one command list per camera on the worker pool
/// 5. submit the lists in camera order, chained with semaphores, the last
///    one signaling the in-flight fence
/// 6. present (or read the frame back when headless) and rotate indices

use rayon::prelude::*;
use crate::error::Result;
use crate::{engine_bail, engine_debug, engine_error, engine_trace, engine_warn};
use crate::frame::{
    FlightState, RenderCommands, FrameResources, FrameInfo, RenderHooks,
};
use crate::handles::CameraHandle;
use crate::program::ShaderBufferKind;
use crate::renderer::{AcquireResult, ClearValue, CommandList, RenderTargetRef, SubmitInfo};
use crate::scene::{
    CameraBuffer, LightKind, MaterialRenderStack,
    DirectionalLightShaderBuffer, PointLightShaderBuffer, SpotLightShaderBuffer,
};

/// Receives the pixels of every headless frame
pub trait FrameSink: Send + Sync {
    /// Tightly packed RGBA8 pixels of a `width` x `height` frame
    fn push_frame(&self, width: u32, height: u32, pixels: Vec<u8>) -> Result<()>;
}

/// What `render_frame` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing to draw; no GPU work, indices unchanged
    Skipped,
    /// The surface changed size; it was recreated and the frame dropped
    OutOfDate,
    Submitted { command_lists: usize },
}

/// One light, ready to push
struct LightDraw {
    kind: LightKind,
    render_layer: u32,
    block: Vec<u8>,
}

fn light_binding(kind: LightKind) -> ShaderBufferKind {
    match kind {
        LightKind::Directional => ShaderBufferKind::DirectionalLight,
        LightKind::Point => ShaderBufferKind::PointLight,
        LightKind::Spot => ShaderBufferKind::SpotLight,
    }
}

pub struct FrameOrchestrator {
    flight: FlightState,
    clear_color: [f32; 4],
    workers: Option<rayon::ThreadPool>,
}

impl FrameOrchestrator {
    /// # Arguments
    ///
    /// * `flight` - Sync objects and slot indices
    /// * `clear_color` - Clear color of every render pass
    /// * `worker_threads` - Size of a dedicated build pool; `None` uses
    ///   the global rayon pool
    pub fn new(flight: FlightState, clear_color: [f32; 4], worker_threads: Option<usize>) -> Result<Self> {
        let workers = match worker_threads {
            Some(threads) => match rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("flare-camera-{}", i))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => engine_bail!("flare::FrameOrchestrator",
                    InitializationFailed: "camera worker pool: {}", e),
            },
            None => None,
        };
        Ok(Self { flight, clear_color, workers })
    }

    pub fn flight(&self) -> &FlightState {
        &self.flight
    }

    /// Cameras that have at least one program to draw, in handle order
    fn drawable_cameras(res: &FrameResources) -> Vec<(CameraHandle, CameraBuffer)> {
        let layers: u32 = res.registry.render_layers().iter().fold(0, |acc, (_, layer)| acc | layer);
        res.tables.cameras.snapshot()
            .into_iter()
            .filter(|(_, camera)| camera.render_layer & layers != 0)
            .collect()
    }

    fn collect_lights(res: &FrameResources) -> Result<Vec<LightDraw>> {
        let mut lights = Vec::new();
        for (_, light) in res.tables.directional_lights.snapshot() {
            let world = res.transforms.world_matrix(light.transform)?;
            lights.push(LightDraw {
                kind: LightKind::Directional,
                render_layer: light.render_layer,
                block: bytemuck::bytes_of(&DirectionalLightShaderBuffer::new(&light, world)).to_vec(),
            });
        }
        for (_, light) in res.tables.point_lights.snapshot() {
            let world = res.transforms.world_matrix(light.transform)?;
            lights.push(LightDraw {
                kind: LightKind::Point,
                render_layer: light.render_layer,
                block: bytemuck::bytes_of(&PointLightShaderBuffer::new(&light, world)).to_vec(),
            });
        }
        for (_, light) in res.tables.spot_lights.snapshot() {
            let world = res.transforms.world_matrix(light.transform)?;
            lights.push(LightDraw {
                kind: LightKind::Spot,
                render_layer: light.render_layer,
                block: bytemuck::bytes_of(&SpotLightShaderBuffer::new(&light, world)).to_vec(),
            });
        }
        Ok(lights)
    }

    /// Record the whole frame of one camera
    fn build_camera(
        res: &FrameResources,
        info: FrameInfo,
        camera: CameraHandle,
        buffer: CameraBuffer,
        stacks: &[MaterialRenderStack],
        lights: &[LightDraw],
        hooks: &dyn RenderHooks,
    ) -> Result<Box<dyn CommandList>> {
        let list = res.renderer.create_command_list(info.flight_frame)?;
        let mut commands = RenderCommands::begin(res, info, camera, buffer, list)?;

        hooks.pre_shadow(&mut commands)?;
        hooks.post_shadow(&mut commands)?;

        commands.bind_camera_target()?;
        hooks.pre_render(&mut commands)?;
        commands.draw_stacks(stacks)?;
        hooks.post_render(&mut commands)?;

        hooks.light_setup(&mut commands)?;
        for kind in LightKind::ALL {
            let mut visible = lights.iter()
                .filter(|l| l.kind == kind && l.render_layer & buffer.render_layer != 0)
                .peekable();
            if visible.peek().is_none() {
                continue;
            }

            if let Some(material) = hooks.pre_light(kind, &mut commands)? {
                commands.bind_material(Some(material))?;
                for light in visible {
                    commands.push_uniform(light_binding(kind), &light.block)?;
                    commands.draw_material()?;
                }
            }
            hooks.post_light(kind, &mut commands)?;
        }

        hooks.post_process(&mut commands)?;

        engine_trace!("flare::FrameOrchestrator",
            "Camera {} recorded {} draw(s)", camera.raw(), commands.draw_count());
        commands.finish()
    }

    /// Render one frame.
    ///
    /// # Arguments
    ///
    /// * `res` - Renderer, registry, pipeline cache, tables and transforms
    /// * `stacks` - Render stacks, in draw order
    /// * `hooks` - Host lifecycle hooks
    /// * `sink` - Receives the read-back pixels when headless
    ///
    /// # Errors
    ///
    /// Any backend error, pool exhaustion or contract error aborts the
    /// frame; the in-flight fence is only reset once every list is built.
    /// When presenting, an image acquired for a frame that then failed is
    /// released cleared before the error is returned.
    pub fn render_frame(
        &mut self,
        res: &FrameResources,
        stacks: &[MaterialRenderStack],
        hooks: &dyn RenderHooks,
        sink: Option<&dyn FrameSink>,
    ) -> Result<FrameOutcome> {
        let cameras = Self::drawable_cameras(res);
        if cameras.is_empty() {
            return Ok(FrameOutcome::Skipped);
        }

        let renderer = res.renderer;
        let headless = renderer.is_headless();
        self.flight.wait_slot(renderer)?;

        let image_index = if headless {
            0
        } else {
            match renderer.acquire_next_image(self.flight.sync().image_available)? {
                AcquireResult::Image(index) => index,
                AcquireResult::OutOfDate => {
                    let (width, height) = renderer.surface_size();
                    engine_debug!("flare::FrameOrchestrator",
                        "Surface out of date, recreating at {}x{}", width, height);
                    renderer.resize(width, height)?;
                    return Ok(FrameOutcome::OutOfDate);
                }
            }
        };

        let lists = match self.build_lists(res, &cameras, stacks, hooks, image_index) {
            Ok(lists) => lists,
            Err(e) => {
                if !headless {
                    if let Err(release) = self.release_image(res, image_index) {
                        engine_error!("flare::FrameOrchestrator",
                            "Image {} could not be released after a failed frame: {}", image_index, release);
                    }
                }
                return Err(e);
            }
        };

        self.submit(res, &lists, image_index, headless, sink)?;
        self.flight.advance();
        Ok(FrameOutcome::Submitted { command_lists: lists.len() })
    }

    /// Reset the flight slot, make sure every pipeline exists and record
    /// one list per camera, in camera order
    fn build_lists(
        &mut self,
        res: &FrameResources,
        cameras: &[(CameraHandle, CameraBuffer)],
        stacks: &[MaterialRenderStack],
        hooks: &dyn RenderHooks,
        image_index: u32,
    ) -> Result<Vec<Box<dyn CommandList>>> {
        let renderer = res.renderer;
        let flight_frame = self.flight.current_flight_frame();
        let attempt = self.flight.begin_attempt();
        renderer.reset_command_lists(flight_frame)?;

        for (camera, buffer) in cameras {
            let target = res.tables.camera_target_layout(buffer)?;
            res.pipelines.ensure(renderer, res.registry, *camera, buffer.render_layer, target)?;
        }

        let lights = Self::collect_lights(res)?;
        let info = FrameInfo {
            frame: self.flight.frame_counter(),
            attempt,
            flight_frame,
            image_index,
            surface_size: renderer.surface_size(),
            clear_color: self.clear_color,
        };

        let build = || -> Result<Vec<Box<dyn CommandList>>> {
            cameras
                .par_iter()
                .map(|(camera, buffer)| {
                    Self::build_camera(res, info, *camera, *buffer, stacks, &lights, hooks)
                })
                .collect()
        };
        match &self.workers {
            Some(pool) => pool.install(build),
            None => build(),
        }
    }

    /// Give an acquired image back after its frame failed to build.
    ///
    /// One list clears the image, waits the acquire semaphore and signals
    /// the fence, then the image is presented. This leaves the semaphore
    /// unsignaled and the swapchain with no image held.
    fn release_image(&mut self, res: &FrameResources, image_index: u32) -> Result<()> {
        let renderer = res.renderer;
        let mut list = renderer.create_command_list(self.flight.current_flight_frame())?;
        list.begin()?;
        list.begin_render_pass(
            &RenderTargetRef::Swapchain { image_index },
            &[ClearValue::Color(self.clear_color)],
        )?;
        list.end_render_pass()?;
        list.end()?;

        let sync = self.flight.sync_mut();
        sync.ensure_chain(renderer, 1)?;
        let done = sync.chain()[0];
        renderer.reset_fence(sync.in_flight)?;
        renderer.submit(SubmitInfo {
            command_list: list.as_ref(),
            wait: Some(sync.image_available),
            signal: Some(done),
            fence: Some(sync.in_flight),
        })?;
        let presented = renderer.present(image_index, done)?;
        self.flight.advance();

        engine_warn!("flare::FrameOrchestrator", "Frame failed to build, image {} presented cleared", image_index);
        if !presented {
            let (width, height) = renderer.surface_size();
            renderer.resize(width, height)?;
        }
        Ok(())
    }

    fn submit(
        &mut self,
        res: &FrameResources,
        lists: &[Box<dyn CommandList>],
        image_index: u32,
        headless: bool,
        sink: Option<&dyn FrameSink>,
    ) -> Result<()> {
        let renderer = res.renderer;
        let sync = self.flight.sync_mut();
        sync.ensure_chain(renderer, lists.len())?;
        let fence = sync.in_flight;
        renderer.reset_fence(fence)?;

        let last = lists.len() - 1;
        for (i, list) in lists.iter().enumerate() {
            let wait = match i {
                0 if headless => None,
                0 => Some(sync.image_available),
                _ => Some(sync.chain()[i - 1]),
            };
            let signal = if i == last && headless { None } else { Some(sync.chain()[i]) };
            renderer.submit(SubmitInfo {
                command_list: list.as_ref(),
                wait,
                signal,
                fence: (i == last).then_some(fence),
            })?;
        }

        if headless {
            renderer.wait_fence(fence)?;
            if let (Some(sink), Some(pixels)) = (sink, renderer.read_back_frame()?) {
                let (width, height) = renderer.surface_size();
                sink.push_frame(width, height, pixels)?;
            }
        } else if !renderer.present(image_index, sync.chain()[last])? {
            let (width, height) = renderer.surface_size();
            engine_warn!("flare::FrameOrchestrator",
                "Present reported an out of date surface, recreating at {}x{}", width, height);
            renderer.resize(width, height)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
