//! Error types for the scan session layer

use crate::state::ScanState;
use thiserror::Error;

/// Errors returned by scan commands
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Device does not support depth scanning")]
    UnsupportedDevice,

    #[error("AR session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("`{command}` is not allowed while the scan is {state}")]
    InvalidState { command: &'static str, state: ScanState },

    #[error("Export failed: {0}")]
    ExportFailure(String),

    #[error("File operation failed: {0}")]
    FileOperation(String),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Scan session lock poisoned")]
    SessionPoisoned,

    #[error(transparent)]
    Core(#[from] lidarscan_core::Error),
}

impl ScanError {
    /// Stable code reported to the UI layer alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::UnsupportedDevice => "UNSUPPORTED_DEVICE",
            ScanError::SessionUnavailable(_) => "SESSION_ERROR",
            ScanError::InvalidArgument(_) => "INVALID_ARGUMENTS",
            ScanError::InvalidState { .. } => "INVALID_STATE",
            ScanError::ExportFailure(_) => "EXPORT_ERROR",
            ScanError::FileOperation(_) => "FILE_ERROR",
            ScanError::Cancelled => "CANCELLED",
            ScanError::SessionPoisoned => "INTERNAL_ERROR",
            ScanError::Core(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type alias for scan commands
pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Errors while loading [`ScannerConfig`](crate::ScannerConfig)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigLoadError {
    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
