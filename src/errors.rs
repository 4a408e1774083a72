// SPDX-License-Identifier: MPL-2.0

//! Error types for the barcode capture pipeline

use std::fmt;

/// Result type alias for capture session and device operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Capture session and device errors
///
/// These are configuration-time failures. They are returned to the owner of
/// the session and never travel through the barcode event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No video-capable capture device is present
    DeviceUnavailable,
    /// The device exists but could not be opened as an input
    InputUnavailable(String),
    /// The session was started before its capture device was configured
    NotConfigured,
    /// The session was torn down and cannot be used again
    TornDown,
    /// Session operations that spawn work need a tokio runtime
    NoRuntime,
    /// Backend error while changing the capture state
    Backend(String),
}

/// Processing errors that terminate the barcode event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Frame buffer does not match its declared geometry
    InvalidFrame(String),
    /// The decoding worker failed
    Decoder(String),
}

/// Top-level error type used by the command line front end
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture session errors
    Capture(CaptureError),
    /// Stream processing errors
    Scan(ScanError),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceUnavailable => write!(f, "No video capture device available"),
            CaptureError::InputUnavailable(msg) => {
                write!(f, "Capture device cannot be opened as input: {}", msg)
            }
            CaptureError::NotConfigured => write!(f, "Capture session is not configured"),
            CaptureError::TornDown => write!(f, "Capture session was torn down"),
            CaptureError::NoRuntime => write!(f, "No tokio runtime available"),
            CaptureError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            ScanError::Decoder(msg) => write!(f, "Decoder failure: {}", msg),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Scan(e) => write!(f, "Scan error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}
impl std::error::Error for ScanError {}
impl std::error::Error for AppError {}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<ScanError> for AppError {
    fn from(err: ScanError) -> Self {
        AppError::Scan(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
