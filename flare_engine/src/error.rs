//! Error types for the Flare engine
//!
//! This module defines the error types used throughout the engine,
//! including backend failures, handle misuse, binding mismatches and
//! headless protocol errors, plus the macros that log an error at the
//! point it is created.

use std::fmt;

/// Result type for Flare engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Flare engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan object creation, submit, present...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, shader, etc.)
    InvalidResource(String),

    /// Initialization failed (engine, renderer, subsystems)
    InitializationFailed(String),

    /// Handle is out of bounds or refers to a destroyed slot
    InvalidHandle(String),

    /// A fixed-capacity pool ran out of entries
    ResourceExhausted(String),

    /// A draw-time push targeted a slot the bound program does not declare
    BindingNotFound(String),

    /// Malformed or truncated headless protocol message
    Protocol(String),

    /// I/O failure (config files, IPC socket)
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidHandle(msg) => write!(f, "Invalid handle: {}", msg),
            Error::ResourceExhausted(msg) => write!(f, "Resource exhausted: {}", msg),
            Error::BindingNotFound(msg) => write!(f, "Binding not found: {}", msg),
            Error::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

// ===== ERROR MACROS =====

/// Log an ERROR and build an [`Error`] from a format string.
///
/// Without a variant the error is a `BackendError`. A variant name followed
/// by `:` selects another string-carrying variant.
///
/// # Example
///
/// ```no_run
/// # use flare_engine::engine_err;
/// let e = engine_err!("flare::vulkan", "vkCreatePipeline failed: {}", -3);
/// let h = engine_err!("flare::HandleTable", InvalidHandle: "camera {} destroyed", 4);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $variant:ident : $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::flare::Error::$variant(message)
    }};
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::flare::Error::BackendError(message)
    }};
}

/// Log an ERROR and return early with the built [`Error`].
#[macro_export]
macro_rules! engine_bail {
    ($($arg:tt)*) => {
        return Err($crate::engine_err!($($arg)*))
    };
}

/// Same as [`engine_err!`] but logged at WARN severity.
///
/// Used for host-side misuse the caller is expected to recover from.
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr, $variant:ident : $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        $crate::flare::Error::$variant(message)
    }};
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        $crate::flare::Error::BackendError(message)
    }};
}

/// Log a WARN and return early with the built [`Error`].
#[macro_export]
macro_rules! engine_bail_warn {
    ($($arg:tt)*) => {
        return Err($crate::engine_warn_err!($($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
