//! Error types for the upload orchestrator.
//!
//! - [`ConfigError`] - Malformed configuration, detected eagerly
//! - [`ValidationError`] - Per-file admission failure (size, type, dimensions)
//! - [`CapacityError`] - A batch that would exceed the file limit
//! - [`UploadError`] - Rejection from the injected upload callback
//! - [`TransitionError`] - Illegal status change
//! - [`RemoveError`] / [`TriggerError`] - Refused user actions
//! - [`NotifyError`] - Notification sink failure (never fatal)
//! - [`OrchestratorError`] - Top-level wrapper
//!
//! Conversion into [`OrchestratorError`] is automatic via `From`,
//! so `?` works across module boundaries.

use thiserror::Error;

use crate::models::UploadId;
use crate::status::UploadStatus;

/// Message used when an upload callback rejects without a reason.
pub const DEFAULT_UPLOAD_ERROR: &str = "Upload failed";

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid orchestrator or upload configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `maxSize` must be positive.
    #[error("maxSize must be greater than 0")]
    InvalidMaxSize,

    /// `maxWidth` / `maxHeight` must be positive.
    #[error("{0} must be greater than 0")]
    InvalidDimension(&'static str),

    /// `maxFiles` must be positive.
    #[error("maxFiles must be greater than 0")]
    InvalidMaxFiles,

    /// The concurrency limit must be positive.
    #[error("concurrencyLimit must be greater than 0")]
    InvalidConcurrency,

    /// An `allowedTypes` entry is not a MIME type.
    #[error("Invalid MIME type in allowedTypes: '{0}'")]
    InvalidMimeType(String),

    /// An environment variable could not be parsed.
    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv { name: &'static str, value: String },

    /// Malformed JSON (including non-string `allowedTypes` entries).
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Why a single file was refused at intake.
///
/// The `Display` output is the message stored on the entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File size must be less than {limit}")]
    TooLarge { limit: String },

    #[error("File type not allowed. Allowed types: {allowed}")]
    TypeNotAllowed { allowed: String },

    #[error("Image dimensions must not exceed {max_width}x{max_height} pixels")]
    DimensionsExceeded { max_width: u32, max_height: u32 },

    #[error("Invalid image file")]
    InvalidImage,
}

// =============================================================================
// Capacity Errors
// =============================================================================

/// An incoming batch would exceed the live-entry limit; nothing was admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Maximum {max_files} file(s) allowed. You can add {remaining} more file(s), {incoming} selected")]
pub struct CapacityError {
    pub max_files: usize,
    pub remaining: usize,
    pub incoming: usize,
}

// =============================================================================
// Upload Errors
// =============================================================================

/// Rejection reason from the upload callback, stored verbatim on the entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UploadError {
    message: String,
}

impl UploadError {
    /// Reject with a reason; a blank reason falls back to the default message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            Self::default()
        } else {
            Self { message }
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for UploadError {
    fn default() -> Self {
        Self {
            message: DEFAULT_UPLOAD_ERROR.to_string(),
        }
    }
}

impl From<String> for UploadError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for UploadError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("Failed to read file: {}", err))
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(format!("HTTP request failed: {}", err))
    }
}

// =============================================================================
// State Machine & Action Errors
// =============================================================================

/// A status change the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Illegal status transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: UploadStatus,
    pub to: UploadStatus,
}

/// Refused removal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoveError {
    #[error("No entry with id {0}")]
    NotFound(UploadId),

    #[error("Entry {0} is uploading and cannot be removed")]
    Uploading(UploadId),
}

/// Refused manual per-entry upload trigger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("Manual upload is only available in multi-file mode")]
    SingleMode,

    #[error("No entry with id {0}")]
    NotFound(UploadId),

    #[error("Entry {id} is {status}, only pending entries can be uploaded")]
    NotPending { id: UploadId, status: UploadStatus },

    #[error("All {limit} upload slot(s) are busy")]
    Busy { limit: usize },

    #[error("Orchestrator has been torn down")]
    Closed,
}

/// Failure inside a notification sink. Logged and swallowed.
#[derive(Debug, Clone, Error)]
#[error("Notification sink failed: {0}")]
pub struct NotifyError(pub String);

// =============================================================================
// Orchestrator Errors (top-level)
// =============================================================================

/// Top-level error wrapping every failure the orchestrator reports.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Capacity error: {0}")]
    Capacity(#[from] CapacityError),

    #[error("Remove error: {0}")]
    Remove(#[from] RemoveError),

    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),

    /// Construction outside of a tokio runtime.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("Orchestrator has been torn down")]
    Closed,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for upload callbacks.
pub type UploadResult<T = ()> = Result<T, UploadError>;

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let cfg: OrchestratorError = ConfigError::InvalidMaxSize.into();
        assert!(cfg.to_string().contains("maxSize"));

        let cap: OrchestratorError = CapacityError {
            max_files: 2,
            remaining: 0,
            incoming: 1,
        }
        .into();
        assert!(cap.to_string().contains("add 0 more"));
    }

    #[test]
    fn test_blank_upload_error_uses_default() {
        assert_eq!(UploadError::new("").message(), DEFAULT_UPLOAD_ERROR);
        assert_eq!(UploadError::new("   ").message(), DEFAULT_UPLOAD_ERROR);
        assert_eq!(UploadError::default().to_string(), DEFAULT_UPLOAD_ERROR);
    }

    #[test]
    fn test_upload_error_is_verbatim() {
        let err: UploadError = "network down".into();
        assert_eq!(err.to_string(), "network down");
    }

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::TooLarge { limit: "1 KB".into() };
        assert_eq!(err.to_string(), "File size must be less than 1 KB");

        let err = ValidationError::DimensionsExceeded {
            max_width: 1920,
            max_height: 1080,
        };
        assert!(err.to_string().contains("1920x1080"));
    }
}
