/*!
# Flare Engine - Vulkan Renderer Backend

Vulkan implementation of the [`flare_engine`] `Renderer` trait, built on
Ash for the API bindings and gpu-allocator for memory.

A [`VulkanRenderer`] either presents to a window through a swapchain or
runs headless, rendering into an offscreen image that is read back after
each frame.

```no_run
use std::sync::Arc;
use flare_engine::flare::{Config, Engine, scene::FlatTransforms};
use flare_engine_renderer_vulkan::VulkanRenderer;

# fn main() -> flare_engine::flare::Result<()> {
let config = Config { headless: true, ..Config::default() };
let renderer = Arc::new(VulkanRenderer::headless(1280, 720, &config)?);

Engine::initialize()?;
let context = Engine::create_context(renderer, Arc::new(FlatTransforms::new()), config)?;
# Ok(())
# }
```
*/

mod debug;
mod vulkan;
mod vulkan_context;
mod vulkan_convert;
mod vulkan_buffer;
mod vulkan_image;
mod vulkan_texture;
mod vulkan_render_pass;
mod vulkan_render_texture;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_model;
mod vulkan_binding;
mod vulkan_pipeline;
mod vulkan_sync;
mod vulkan_command_pools;
mod vulkan_command_list;
mod vulkan_surface;
mod vulkan_swapchain;
mod vulkan_headless;

pub use vulkan::VulkanRenderer;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
