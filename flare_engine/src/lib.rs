/*!
# Flare Engine

Backend-agnostic rendering core.

The host talks to one [`flare::RenderContext`]: it creates shaders,
programs, cameras, lights, models, textures and render textures through
handles, places mesh render buffers on the render stacks and calls
`render_frame` once per frame. The frame is built in parallel, one command
list per camera, and submitted as a semaphore chain.

## Architecture

- **Renderer**: backend trait creating GPU objects and submitting work
- **ProgramRegistry**: programs, their shaders and render layers
- **PipelineCache**: pipelines per (camera, program) with binding state
- **RenderStackBatcher**: mesh renders grouped by material
- **FrameOrchestrator**: per-camera build, chained submit, flight rotation
- **ipc**: headless protocol and Unix socket transport

Backend implementations (Vulkan) live in their own crates.
*/

// Internal modules
mod error;
mod engine;
mod config;
pub mod log;
pub mod utils;
pub mod handles;
pub mod renderer;
pub mod program;
pub mod binding;
pub mod pipeline;
pub mod scene;
pub mod frame;
pub mod context;
pub mod ipc;

// Main flare namespace module
pub mod flare {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine registry
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::{Config, DebugSeverity, RenderingEngine};

    // Host entry point
    pub use crate::context::{BuiltinPrograms, RenderContext};

    pub use crate::handles::*;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, format_entry};
    }

    pub mod utils {
        pub use crate::utils::*;
    }

    // Backend traits and descriptors
    pub mod render {
        pub use crate::renderer::*;
    }

    pub mod program {
        pub use crate::program::*;
    }

    pub mod binding {
        pub use crate::binding::*;
    }

    pub mod pipeline {
        pub use crate::pipeline::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }

    pub mod ipc {
        pub use crate::ipc::*;
    }
}

// Re-export math library at crate root
pub use glam;
