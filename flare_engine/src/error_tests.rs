//! Unit tests for error.rs
//!
//! Tests all Error variants, their Display output and the error macros.

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkQueueSubmit failed"));
}

#[test]
fn test_out_of_memory_display() {
    let err = Error::OutOfMemory;
    assert_eq!(format!("{}", err), "Out of GPU memory");
}

#[test]
fn test_invalid_handle_display() {
    let err = Error::InvalidHandle("camera 3 out of bounds".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Invalid handle"));
    assert!(display.contains("camera 3"));
}

#[test]
fn test_resource_exhausted_display() {
    let err = Error::ResourceExhausted("push pool".to_string());
    assert!(format!("{}", err).contains("Resource exhausted"));
}

#[test]
fn test_binding_not_found_display() {
    let err = Error::BindingNotFound("slot 7".to_string());
    assert!(format!("{}", err).contains("Binding not found: slot 7"));
}

#[test]
fn test_protocol_display() {
    let err = Error::Protocol("truncated payload".to_string());
    assert!(format!("{}", err).contains("Protocol error"));
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: Error = io.into();
    match err {
        Error::Io(msg) => assert!(msg.contains("pipe closed")),
        other => panic!("unexpected variant {:?}", other),
    }
}

#[test]
fn test_error_clone() {
    let err1 = Error::InitializationFailed("no gpu".to_string());
    let err2 = err1.clone();
    assert_eq!(format!("{}", err1), format!("{}", err2));
}

// ============================================================================
// MACROS
// ============================================================================

#[test]
fn test_engine_err_defaults_to_backend_error() {
    let err = crate::engine_err!("flare::test", "code {}", 42);
    match err {
        Error::BackendError(msg) => assert_eq!(msg, "code 42"),
        other => panic!("unexpected variant {:?}", other),
    }
}

#[test]
fn test_engine_err_with_variant() {
    let err = crate::engine_err!("flare::test", InvalidHandle: "model {} destroyed", 9);
    match err {
        Error::InvalidHandle(msg) => assert_eq!(msg, "model 9 destroyed"),
        other => panic!("unexpected variant {:?}", other),
    }
}

#[test]
fn test_engine_bail_returns_err() {
    fn failing(flag: bool) -> Result<u32> {
        if flag {
            crate::engine_bail!("flare::test", ResourceExhausted: "pool full");
        }
        Ok(1)
    }

    assert!(matches!(failing(true), Err(Error::ResourceExhausted(_))));
    assert_eq!(failing(false).unwrap(), 1);
}

#[test]
fn test_engine_bail_warn_returns_err() {
    fn failing() -> Result<()> {
        crate::engine_bail_warn!("flare::test", BindingNotFound: "slot {}", 2);
    }

    assert!(matches!(failing(), Err(Error::BindingNotFound(_))));
}
