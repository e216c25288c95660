//! Integration tests for loading the engine configuration from disk
//!
//! Run with: cargo test --test config_integration_tests

use flare_engine::flare::{Config, DebugSeverity, Error};
use std::io::Write;

fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("flare_config_{}_{}.toml", name, std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn test_integration_load_config_file() {
    let path = write_temp("full", r#"
        application_name = "Editor Viewport"
        rendering_engine = "Vulkan"
        max_flight_frames = 3
        push_pool_capacity = 64
        worker_threads = 4
        headless = true
        pipe_name = "Editor-IPC"
        enable_validation = false
        debug_severity = "ErrorsOnly"
        clear_color = [0.1, 0.2, 0.3, 1.0]
    "#);

    let config = Config::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.application_name, "Editor Viewport");
    assert_eq!(config.flight_pool_size(), 4);
    assert_eq!(config.push_pool_capacity, 64);
    assert_eq!(config.worker_threads, Some(4));
    assert!(config.headless);
    assert_eq!(config.pipe_name, "Editor-IPC");
    assert!(!config.enable_validation);
    assert_eq!(config.debug_severity, DebugSeverity::ErrorsOnly);
}

#[test]
fn test_integration_load_rejects_bad_type() {
    let path = write_temp("bad", "max_flight_frames = \"two\"");
    let result = Config::load(&path);
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}
