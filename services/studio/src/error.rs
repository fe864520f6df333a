//! services/studio/src/error.rs
//!
//! Defines the primary error type for the studio service.

use crate::config::ConfigError;
use lesson_pipeline_core::ports::PortError;

/// The primary error type for the `studio` service.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Lesson pipeline error: {0}")]
    Port(#[from] PortError),

    /// Represents a standard Input/Output error (e.g., reading the request file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The lesson request file could not be parsed.
    #[error("Invalid lesson request: {0}")]
    Request(#[from] serde_json::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
