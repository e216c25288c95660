//! Frame orchestration
//!
//! Flight-frame rotation, per-camera command recording, host hooks and
//! the orchestrator that ties them into one submitted frame.

mod flight;
mod hooks;
mod render_commands;
mod orchestrator;

pub use flight::{FlightState, FrameSync};
pub use hooks::{RenderHooks, NoHooks};
pub use render_commands::{RenderCommands, RenderTarget, FrameResources, FrameInfo};
pub use orchestrator::{FrameOrchestrator, FrameOutcome, FrameSink};

#[cfg(test)]
pub(crate) mod test_fixture;
