//! Error handling for FastVox
//!
//! Nothing in here is ever constructed on the audio thread. Real-time paths
//! degrade (clamp, drop, fall back) instead of failing.

use thiserror::Error;

/// Result type alias for FastVox operations
pub type Result<T> = std::result::Result<T, FastVoxError>;

/// Main error type for FastVox operations
#[derive(Error, Debug)]
pub enum FastVoxError {
    // Parameter Errors
    #[error("Invalid parameter {param}: {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: String },

    // Host Errors
    #[error("Unsupported channel layout: {inputs} in / {outputs} out (stereo only)")]
    UnsupportedLayout { inputs: usize, outputs: usize },

    #[error("Engine used before prepare()")]
    NotPrepared,

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Audio Errors
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid audio: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FastVoxError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            FastVoxError::InvalidParameter { .. } => "INVALID_PARAMETER",
            FastVoxError::UnknownParameter { .. } => "UNKNOWN_PARAMETER",
            FastVoxError::UnsupportedLayout { .. } => "UNSUPPORTED_LAYOUT",
            FastVoxError::NotPrepared => "NOT_PREPARED",
            FastVoxError::InvalidConfig { .. } => "INVALID_CONFIG",
            FastVoxError::FileNotFound { .. } => "FILE_NOT_FOUND",
            FastVoxError::InvalidAudio { .. } => "INVALID_AUDIO",
            FastVoxError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            FastVoxError::Io(_) => "IO_ERROR",
            FastVoxError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Layout errors are fatal for the host session; everything else can be
    /// retried with different input.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            FastVoxError::UnsupportedLayout { .. } | FastVoxError::NotPrepared
        )
    }

    pub(crate) fn invalid_param(
        param: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        FastVoxError::InvalidParameter {
            param: param.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}
