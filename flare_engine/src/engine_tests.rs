//! Unit tests for the Engine registry
//!
//! ENGINE_STATE and LOGGER are process globals; every test is #[serial].

use crate::flare::{Config, Engine, Error};
use crate::flare::log::{LogEntry, LogSeverity, Logger};
use crate::renderer::mock_renderer::MockRenderer;
use crate::scene::FlatTransforms;
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST HELPERS
// ============================================================================

struct TestLogger {
    entries: Arc<Mutex<Vec<(LogSeverity, String)>>>,
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push((entry.severity, entry.message.clone()));
    }
}

fn setup() {
    Engine::reset_for_testing();
    Engine::initialize().unwrap();
}

fn create() -> crate::error::Result<Arc<crate::context::RenderContext>> {
    Engine::create_context(
        Arc::new(MockRenderer::new()),
        Arc::new(FlatTransforms::new()),
        Config::default(),
    )
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
#[serial]
fn test_initialize_is_idempotent() {
    setup();
    assert!(Engine::initialize().is_ok());
    assert!(Engine::initialize().is_ok());
}

#[test]
#[serial]
fn test_create_then_access_context() {
    setup();
    let created = create().unwrap();
    let fetched = Engine::context().unwrap();
    assert!(Arc::ptr_eq(&created, &fetched));
    assert!(Engine::has_context());
    Engine::destroy_context().unwrap();
}

#[test]
#[serial]
fn test_second_context_is_rejected() {
    setup();
    let _first = create().unwrap();
    assert!(matches!(create(), Err(Error::InitializationFailed(_))));
    Engine::destroy_context().unwrap();
}

#[test]
#[serial]
fn test_context_before_create_fails() {
    setup();
    assert!(matches!(Engine::context(), Err(Error::InitializationFailed(_))));
    assert!(!Engine::has_context());
}

#[test]
#[serial]
fn test_destroy_context_allows_recreate() {
    setup();
    create().unwrap();
    Engine::destroy_context().unwrap();
    assert!(Engine::context().is_err());
    assert!(create().is_ok());
    Engine::destroy_context().unwrap();
}

#[test]
#[serial]
fn test_destroy_without_context_is_ok() {
    setup();
    assert!(Engine::destroy_context().is_ok());
}

#[test]
#[serial]
fn test_shutdown_clears_context() {
    setup();
    create().unwrap();
    Engine::shutdown();
    Engine::shutdown();
    assert!(!Engine::has_context());
}

#[test]
#[serial]
fn test_invalid_config_is_not_registered() {
    setup();
    let config = Config { max_flight_frames: 0, ..Config::default() };
    let result = Engine::create_context(
        Arc::new(MockRenderer::new()),
        Arc::new(FlatTransforms::new()),
        config,
    );
    assert!(result.is_err());
    assert!(!Engine::has_context());
}

#[test]
#[serial]
fn test_register_prebuilt_context() {
    setup();
    let context = crate::context::RenderContext::new(
        Arc::new(MockRenderer::new()),
        Arc::new(FlatTransforms::new()),
        Config::default(),
    ).unwrap();
    let registered = Engine::register_context(context).unwrap();
    assert!(Arc::ptr_eq(&registered, &Engine::context().unwrap()));
    Engine::destroy_context().unwrap();
}

// ============================================================================
// LOGGING
// ============================================================================

#[test]
#[serial]
fn test_custom_logger_receives_entries() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(TestLogger { entries: entries.clone() });

    crate::engine_info!("flare::Test", "hello {}", 1);
    crate::engine_error!("flare::Test", "broken");

    Engine::reset_logger();

    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], (LogSeverity::Info, "hello 1".to_string()));
    assert_eq!(entries[1].0, LogSeverity::Error);
}

#[test]
#[serial]
fn test_registry_errors_are_logged() {
    setup();
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(TestLogger { entries: entries.clone() });

    let _ = Engine::context();

    Engine::reset_logger();
    let entries = entries.lock().unwrap();
    assert!(entries.iter().any(|(sev, msg)| *sev == LogSeverity::Error && msg.contains("Context not created")));
}
