// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera application
//!
//! Every failure is local: it is logged, the operation that hit it is
//! abandoned, and the status indicator is updated. Nothing here is fatal.

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Camera session errors
    Camera(CameraError),
    /// Motion sensing errors
    Motion(MotionError),
    /// Photo capture errors
    Photo(PhotoError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Camera session setup errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// No camera matches the requested type or position
    DeviceUnavailable(String),
    /// The session refused the camera input or the photo output
    ConfigurationRejected(String),
    /// Session was used before `start_session` or after `stop_session`
    NotRunning,
    /// Backend error (e.g. V4L2 ioctl failure)
    BackendError(String),
}

/// Motion sensing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionError {
    /// No accelerometer could be found
    SensorUnavailable(String),
    /// A single reading failed
    ReadFailed(String),
}

/// Photo capture errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoError {
    /// The session finished the request without image data
    NoImageData,
    /// Capture failed
    CaptureFailed(String),
    /// The completion never arrived within the capture timeout
    Timeout,
    /// The session dropped the request before completing it
    Abandoned,
    /// Save failed
    SaveFailed(String),
    /// Share failed
    ShareFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Motion(e) => write!(f, "Motion error: {}", e),
            AppError::Photo(e) => write!(f, "Photo error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::DeviceUnavailable(msg) => write!(f, "No camera available: {}", msg),
            CameraError::ConfigurationRejected(msg) => {
                write!(f, "Session configuration rejected: {}", msg)
            }
            CameraError::NotRunning => write!(f, "Capture session is not running"),
            CameraError::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::SensorUnavailable(msg) => write!(f, "No accelerometer: {}", msg),
            MotionError::ReadFailed(msg) => write!(f, "Failed to read motion sample: {}", msg),
        }
    }
}

impl fmt::Display for PhotoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoError::NoImageData => write!(f, "Capture returned no image data"),
            PhotoError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            PhotoError::Timeout => write!(f, "Capture timed out"),
            PhotoError::Abandoned => write!(f, "Capture was abandoned by the session"),
            PhotoError::SaveFailed(msg) => write!(f, "Save failed: {}", msg),
            PhotoError::ShareFailed(msg) => write!(f, "Share failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for MotionError {}
impl std::error::Error for PhotoError {}

// Conversions from sub-errors to AppError
impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<MotionError> for AppError {
    fn from(err: MotionError) -> Self {
        AppError::Motion(err)
    }
}

impl From<PhotoError> for AppError {
    fn from(err: PhotoError) -> Self {
        AppError::Photo(err)
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
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<CameraError> for PhotoError {
    fn from(err: CameraError) -> Self {
        PhotoError::CaptureFailed(err.to_string())
    }
}

impl From<std::io::Error> for PhotoError {
    fn from(err: std::io::Error) -> Self {
        PhotoError::SaveFailed(err.to_string())
    }
}

impl From<image::ImageError> for PhotoError {
    fn from(err: image::ImageError) -> Self {
        PhotoError::CaptureFailed(err.to_string())
    }
}
