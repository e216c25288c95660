//! Binding subsystem: layout classification, per-flight push pools and
//! the per-program backend binding objects

mod binding_layout;
mod push_pool;
mod program_bindings;

pub use binding_layout::{BindingLayoutInfo, BindingCategory, PushBinding, STATIC_SET_INDEX};
pub use push_pool::PushPools;
pub use program_bindings::ProgramBindings;
