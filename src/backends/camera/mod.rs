// SPDX-License-Identifier: GPL-3.0-only

//! Capture session abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │    CameraContext    │  ← owns the session, issues captures
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureSession Trait│  ← common interface
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌───────┐  ┌───────┐
//!   │ V4L2  │  │Virtual│
//!   └───────┘  └───────┘
//! ```
//!
//! A capture request returns immediately with a [`PendingCapture`]; the
//! session completes it later from its own thread or task.

pub mod types;
pub mod v4l2;
pub mod virtual_session;

pub use types::*;
pub use v4l2::V4l2CaptureSession;
pub use virtual_session::VirtualCaptureSession;

use crate::errors::{CameraError, PhotoError};
use crate::orientation::VideoOrientation;
use image::RgbImage;
use std::time::Duration;
use tokio::sync::oneshot;

/// Live camera session with a photo output
pub trait CaptureSession: Send + Sync {
    /// Human-readable camera name
    fn name(&self) -> &str;

    /// Open the camera, attach the photo output and start streaming.
    ///
    /// Starting a running session is a no-op.
    ///
    /// # Errors
    /// * `CameraError::DeviceUnavailable` - no matching camera
    /// * `CameraError::ConfigurationRejected` - input or output could not be attached
    fn start_session(&self) -> Result<(), CameraError>;

    /// Stop streaming and release the camera. Pending captures are not
    /// cancelled; they finish or are abandoned by the backend.
    fn stop_session(&self);

    fn is_running(&self) -> bool;

    /// Request a photo now. Never blocks.
    fn capture_photo(&self, settings: CaptureSettings) -> PendingCapture;

    /// Orientation applied to subsequent captures
    fn set_orientation(&self, orientation: VideoOrientation);

    fn orientation(&self) -> VideoOrientation;

    /// Most recent preview frame for display, if streaming
    fn latest_preview(&self) -> Option<RgbImage>;
}

/// Completion side of a capture request, held by the session
#[derive(Debug)]
pub struct CaptureCompleter {
    sender: oneshot::Sender<Result<CapturedImage, PhotoError>>,
}

impl CaptureCompleter {
    /// Deliver the result. Ignored if the requester stopped waiting.
    pub fn complete(self, result: Result<CapturedImage, PhotoError>) {
        let _ = self.sender.send(result);
    }

    pub fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Requester side of a capture: resolves once with the image or an error
#[derive(Debug)]
pub struct PendingCapture {
    receiver: oneshot::Receiver<Result<CapturedImage, PhotoError>>,
}

impl PendingCapture {
    pub fn channel() -> (CaptureCompleter, PendingCapture) {
        let (sender, receiver) = oneshot::channel();
        (CaptureCompleter { sender }, PendingCapture { receiver })
    }

    /// Already-finished request (e.g. rejected before reaching the camera)
    pub fn ready(result: Result<CapturedImage, PhotoError>) -> Self {
        let (completer, pending) = Self::channel();
        completer.complete(result);
        pending
    }

    /// Wait for the result, giving up after `timeout`.
    ///
    /// # Errors
    /// * `PhotoError::Timeout` - nothing arrived in time
    /// * `PhotoError::Abandoned` - the session dropped the request
    pub async fn wait(self, timeout: Duration) -> Result<CapturedImage, PhotoError> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PhotoError::Abandoned),
            Err(_) => Err(PhotoError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_capture_resolves_immediately() {
        let pending = PendingCapture::ready(Err(PhotoError::NoImageData));
        let result = pending.wait(Duration::from_secs(1)).await;
        assert_eq!(result.unwrap_err(), PhotoError::NoImageData);
    }

    #[tokio::test]
    async fn test_dropped_completer_is_abandoned() {
        let (completer, pending) = PendingCapture::channel();
        drop(completer);
        let result = pending.wait(Duration::from_secs(1)).await;
        assert_eq!(result.unwrap_err(), PhotoError::Abandoned);
    }

    #[tokio::test]
    async fn test_stalled_capture_times_out() {
        let (completer, pending) = PendingCapture::channel();
        let result = pending.wait(Duration::from_millis(20)).await;
        assert_eq!(result.unwrap_err(), PhotoError::Timeout);
        assert!(completer.is_abandoned());
    }

    #[tokio::test]
    async fn test_completion_from_another_task() {
        let (completer, pending) = PendingCapture::channel();
        tokio::spawn(async move {
            let image = CapturedImage::new(vec![1, 2, 3], ImageFormat::Jpeg, 1, 1);
            completer.complete(Ok(image));
        });
        let image = pending.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(image.len(), 3);
    }
}
