//! Error types for map rendering.

use std::time::Duration;

use thiserror::Error;

use crate::StyleId;

/// Result type alias using RenderError.
pub type RenderResult<T> = Result<T, RenderError>;

/// Failures a render caller can observe.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// No rendering backend was available when the dispatcher started.
    #[error("Rendering engine unavailable")]
    EngineUnavailable,

    /// The style document failed to parse. The cache entry has been evicted.
    #[error("Failed to load style {style_id}: {message}")]
    StyleLoad { style_id: StyleId, message: String },

    /// The caller stopped waiting. The render itself may still be running.
    #[error("Render timed out after {waited:?}")]
    Timeout { waited: Duration },

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine failed (or panicked) while drawing a single job.
    #[error("Rendering failed: {0}")]
    Engine(String),

    /// The job was discarded before any result was published.
    #[error("Render job dropped before a result was published")]
    Dropped,
}

impl RenderError {
    /// True for the caller-side timeout, so "slow" can be told from "broken".
    pub fn is_timeout(&self) -> bool {
        matches!(self, RenderError::Timeout { .. })
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            RenderError::InvalidArgument(_) => 400,
            RenderError::Unsupported(_) => 501,
            RenderError::EngineUnavailable | RenderError::Dropped => 503,
            RenderError::Timeout { .. } => 504,
            RenderError::StyleLoad { .. } | RenderError::Engine(_) => 500,
        }
    }
}
