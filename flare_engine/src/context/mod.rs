//! Render context: the host-facing API and the tables behind it

mod resource_tables;
mod render_context;

pub use resource_tables::ResourceTables;
pub use render_context::{RenderContext, BuiltinPrograms};
