//! Error types shared across CaptionKit crates.

use std::path::PathBuf;

/// Top-level error type for CaptionKit operations.
///
/// The variants mirror the failure classes of an editing session:
/// validation problems are rejected before any work starts, resource and
/// seek failures abort an export, encoding failures surface only after the
/// degraded retry, and transcription failures stay recoverable.
#[derive(Debug, thiserror::Error)]
pub enum CaptionkitError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Resource load error: {message}")]
    ResourceLoad { message: String },

    #[error("Seek timed out after {timeout_ms}ms at frame {frame_index} ({time_secs:.3}s)")]
    SeekTimeout {
        frame_index: u64,
        time_secs: f64,
        timeout_ms: u64,
    },

    #[error("Encoding error: {message}")]
    Encoding { message: String },

    #[error("Transcription error: {message}")]
    Transcription { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CaptionkitError.
pub type CaptionkitResult<T> = Result<T, CaptionkitError>;

impl CaptionkitError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn resource_load(msg: impl Into<String>) -> Self {
        Self::ResourceLoad {
            message: msg.into(),
        }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding {
            message: msg.into(),
        }
    }

    pub fn transcription(msg: impl Into<String>) -> Self {
        Self::Transcription {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether the editor can continue after this error without
    /// discarding the session (only transcription failures qualify).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transcription { .. })
    }
}
