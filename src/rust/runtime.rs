use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use std::env;
use std::sync::OnceLock;

use crate::classifier::ClassifierError;

static ENVIRONMENT: OnceLock<Result<(), String>> = OnceLock::new();

#[derive(Debug)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization_level: GraphOptimizationLevel,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inter_threads: 0, // Let ONNX Runtime decide
            intra_threads: 1, // One forward pass, one thread
            optimization_level: GraphOptimizationLevel::Level3,
        }
    }
}

impl Clone for RuntimeConfig {
    fn clone(&self) -> Self {
        Self {
            inter_threads: self.inter_threads,
            intra_threads: self.intra_threads,
            optimization_level: copy_level(&self.optimization_level),
        }
    }
}

fn copy_level(level: &GraphOptimizationLevel) -> GraphOptimizationLevel {
    match level {
        GraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
        GraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
        GraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        GraphOptimizationLevel::Disable => GraphOptimizationLevel::Disable,
    }
}

fn parse_level(value: &str) -> Option<GraphOptimizationLevel> {
    match value.trim().to_ascii_lowercase().as_str() {
        "0" | "disable" | "none" => Some(GraphOptimizationLevel::Disable),
        "1" | "level1" | "basic" => Some(GraphOptimizationLevel::Level1),
        "2" | "level2" | "extended" => Some(GraphOptimizationLevel::Level2),
        "3" | "level3" | "all" => Some(GraphOptimizationLevel::Level3),
        _ => None,
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `IMGCLASS_INTER_THREADS`, `IMGCLASS_INTRA_THREADS`
    /// and `IMGCLASS_OPT_LEVEL`. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = read_threads("IMGCLASS_INTER_THREADS") {
            config.inter_threads = n;
        }
        if let Some(n) = read_threads("IMGCLASS_INTRA_THREADS") {
            config.intra_threads = n;
        }
        if let Ok(value) = env::var("IMGCLASS_OPT_LEVEL") {
            match parse_level(&value) {
                Some(level) => config.optimization_level = level,
                None => log::warn!("Ignoring IMGCLASS_OPT_LEVEL={}", value),
            }
        }
        config
    }
}

fn read_threads(key: &str) -> Option<usize> {
    let value = env::var(key).ok()?;
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("Ignoring {}={}", key, value);
            None
        }
    }
}

fn init_onnx_environment() -> ort::Result<()> {
    ort::init()
        .with_name("imgclass")
        .commit()?;
    Ok(())
}

/// Commits the process-wide ONNX Runtime environment on first use.
pub fn ensure_initialized() -> Result<(), ClassifierError> {
    ENVIRONMENT
        .get_or_init(|| init_onnx_environment().map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| ClassifierError::ModelError(format!("Failed to initialize ONNX Runtime environment: {}", e)))
}

fn builder_error(e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::ModelError(format!("Failed to configure ONNX Runtime session: {}", e))
}

pub fn create_session_builder(config: &RuntimeConfig) -> Result<SessionBuilder, ClassifierError> {
    ensure_initialized()?;
    let mut builder = Session::builder().map_err(builder_error)?;

    // Configure threading
    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads).map_err(builder_error)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads).map_err(builder_error)?;
    }

    builder = builder
        .with_optimization_level(copy_level(&config.optimization_level))
        .map_err(builder_error)?;

    Ok(builder)
}
