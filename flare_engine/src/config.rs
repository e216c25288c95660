/// Engine configuration
///
/// Plain struct with defaults, loadable from TOML. Keys missing from the
/// file keep their default value.

use std::path::Path;
use serde::Deserialize;
use crate::error::Result;
use crate::engine_bail;

/// Graphics backend driving the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderingEngine {
    #[default]
    Vulkan,
}

impl RenderingEngine {
    fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "vulkan" => Ok(RenderingEngine::Vulkan),
            other => engine_bail!("flare::Config",
                InitializationFailed: "unknown rendering engine '{}'", other),
        }
    }
}

/// Validation layer messages forwarded to the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum DebugSeverity {
    ErrorsOnly,
    #[default]
    ErrorsAndWarnings,
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub application_name: String,
    pub rendering_engine: RenderingEngine,
    /// Frames the CPU may record ahead of the GPU. Command lists and push
    /// pools rotate over one slot more than this.
    pub max_flight_frames: usize,
    /// Push sets per push binding per flight frame
    pub push_pool_capacity: u32,
    /// Camera build threads; `None` uses rayon's global pool
    pub worker_threads: Option<usize>,
    pub headless: bool,
    /// Socket name of the headless transport, under the temp directory
    pub pipe_name: String,
    pub enable_validation: bool,
    pub debug_severity: DebugSeverity,
    pub clear_color: [f32; 4],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            application_name: "FlareEngine".to_string(),
            rendering_engine: RenderingEngine::Vulkan,
            max_flight_frames: 2,
            push_pool_capacity: 32,
            worker_threads: None,
            headless: false,
            pipe_name: "FlareEngine-IPC".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// On-disk form: every key optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    application_name: Option<String>,
    rendering_engine: Option<String>,
    max_flight_frames: Option<usize>,
    push_pool_capacity: Option<u32>,
    worker_threads: Option<usize>,
    headless: Option<bool>,
    pipe_name: Option<String>,
    enable_validation: Option<bool>,
    debug_severity: Option<DebugSeverity>,
    clear_color: Option<[f32; 4]>,
}

impl Config {
    /// Parse a TOML document; missing keys take their default
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = match toml::from_str(content) {
            Ok(file) => file,
            Err(e) => engine_bail!("flare::Config", InitializationFailed: "invalid config: {}", e),
        };

        let defaults = Config::default();
        let config = Config {
            application_name: file.application_name.unwrap_or(defaults.application_name),
            rendering_engine: match file.rendering_engine {
                Some(name) => RenderingEngine::parse(&name)?,
                None => defaults.rendering_engine,
            },
            max_flight_frames: file.max_flight_frames.unwrap_or(defaults.max_flight_frames),
            push_pool_capacity: file.push_pool_capacity.unwrap_or(defaults.push_pool_capacity),
            worker_threads: file.worker_threads.or(defaults.worker_threads),
            headless: file.headless.unwrap_or(defaults.headless),
            pipe_name: file.pipe_name.unwrap_or(defaults.pipe_name),
            enable_validation: file.enable_validation.unwrap_or(defaults.enable_validation),
            debug_severity: file.debug_severity.unwrap_or(defaults.debug_severity),
            clear_color: file.clear_color.unwrap_or(defaults.clear_color),
        };
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => engine_bail!("flare::Config", Io: "failed to read {}: {}", path.display(), e),
        };
        Self::from_toml_str(&content)
    }

    /// Check values a frame could not run with
    pub fn validate(&self) -> Result<()> {
        if self.max_flight_frames == 0 {
            engine_bail!("flare::Config", InitializationFailed: "max_flight_frames must be at least 1");
        }
        if self.push_pool_capacity == 0 {
            engine_bail!("flare::Config", InitializationFailed: "push_pool_capacity must be at least 1");
        }
        if self.worker_threads == Some(0) {
            engine_bail!("flare::Config", InitializationFailed: "worker_threads must be at least 1 when set");
        }
        Ok(())
    }

    /// Command list and push pool slots
    pub fn flight_pool_size(&self) -> usize {
        self.max_flight_frames + 1
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
