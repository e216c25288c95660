/// Flare Engine - process-wide registry for the render context and logger
///
/// Init and teardown follow a fixed order:
/// `initialize` → `create_context` → `context` (host dispatch) →
/// `destroy_context` → `shutdown`. The context is an ordinary object and
/// can be used without the registry.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::SystemTime;
use crate::config::Config;
use crate::context::RenderContext;
use crate::renderer::Renderer;
use crate::scene::TransformResolver;
use crate::error::{Error, Result};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};

// ===== INTERNAL STATE =====

static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

struct EngineState {
    context: RwLock<Option<Arc<RenderContext>>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            context: RwLock::new(None),
        }
    }
}

// ===== PUBLIC API =====

/// Engine registry
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use flare_engine::flare::{Config, Engine};
/// # fn renderer() -> Arc<dyn flare_engine::flare::render::Renderer> { unimplemented!() }
/// # fn transforms() -> Arc<dyn flare_engine::flare::scene::TransformResolver> { unimplemented!() }
///
/// Engine::initialize()?;
/// Engine::create_context(renderer(), transforms(), Config::default())?;
///
/// let context = Engine::context()?;
/// println!("frame {}", context.frame_counter());
///
/// Engine::destroy_context()?;
/// Engine::shutdown();
/// # Ok::<(), flare_engine::flare::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Log errors before returning them
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!("flare::Engine", "Initialization failed: {}", msg);
            }
            _ => {
                crate::engine_error!("flare::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    fn state() -> Result<&'static EngineState> {
        ENGINE_STATE.get().ok_or_else(|| Self::log_and_return_error(
            Error::InitializationFailed("Engine not initialized. Call Engine::initialize() first.".to_string())
        ))
    }

    /// Initialize the registry. Idempotent.
    pub fn initialize() -> Result<()> {
        ENGINE_STATE.get_or_init(EngineState::new);
        Ok(())
    }

    /// Drop the registered context, if any
    ///
    /// The context is torn down once the last outstanding `Arc` to it is
    /// dropped. Call `initialize()` before creating a new one.
    pub fn shutdown() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut context) = state.context.write() {
                *context = None;
            }
        }
    }

    /// Build a render context and register it
    ///
    /// # Errors
    ///
    /// - `InitializationFailed` if the engine is not initialized, a context
    ///   already exists, or `config` does not validate
    /// - any backend error creating the frame sync objects
    pub fn create_context(
        renderer: Arc<dyn Renderer>,
        transforms: Arc<dyn TransformResolver>,
        config: Config,
    ) -> Result<Arc<RenderContext>> {
        let state = Self::state()?;

        let mut lock = state.context.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Context lock poisoned".to_string())
            ))?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(
                Error::InitializationFailed("Context already exists. Call Engine::destroy_context() first.".to_string())
            ));
        }

        let context = Arc::new(RenderContext::new(renderer, transforms, config)?);
        *lock = Some(Arc::clone(&context));

        crate::engine_info!("flare::Engine", "Render context registered");

        Ok(context)
    }

    /// Register a context built by the caller (for example with a shader compiler)
    pub fn register_context(context: RenderContext) -> Result<Arc<RenderContext>> {
        let state = Self::state()?;

        let mut lock = state.context.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Context lock poisoned".to_string())
            ))?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(
                Error::InitializationFailed("Context already exists. Call Engine::destroy_context() first.".to_string())
            ));
        }

        let context = Arc::new(context);
        *lock = Some(Arc::clone(&context));
        Ok(context)
    }

    /// The registered context
    pub fn context() -> Result<Arc<RenderContext>> {
        let state = Self::state()?;

        let lock = state.context.read()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Context lock poisoned".to_string())
            ))?;

        lock.clone()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("Context not created. Call Engine::create_context() first.".to_string())
            ))
    }

    pub fn has_context() -> bool {
        ENGINE_STATE.get()
            .and_then(|state| state.context.read().ok().map(|lock| lock.is_some()))
            .unwrap_or(false)
    }

    /// Unregister the context. Destroying when none exists is not an error.
    pub fn destroy_context() -> Result<()> {
        let state = Self::state()?;

        let mut lock = state.context.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Context lock poisoned".to_string())
            ))?;

        if lock.take().is_some() {
            crate::engine_info!("flare::Engine", "Render context destroyed");
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut context) = state.context.write() {
                *context = None;
            }
        }
    }

    // ===== LOGGING API =====

    /// Replace the logger (file logger, headless pipe logger...)
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to DefaultLogger
    pub fn reset_logger() {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Used by `engine_trace!` through `engine_warn!`
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Used by `engine_error!` to include the source location
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
