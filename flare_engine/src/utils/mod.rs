//! Shared building blocks

mod handle_table;

pub use handle_table::{Handle, HandleTable};
