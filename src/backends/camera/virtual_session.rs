// SPDX-License-Identifier: GPL-3.0-only

//! Virtual capture session
//!
//! Produces photos without camera hardware, either from a generated test
//! pattern or from a still image file. Captures are rendered and encoded on
//! a blocking task so the requester never waits on JPEG encoding.
//!
//! Faults can be injected to exercise the error paths of session setup and
//! capture delivery.

use super::types::{CaptureSettings, FlashMode, apply_orientation, encode_jpeg};
use super::{CaptureCompleter, CaptureSession, PendingCapture};
use crate::constants::{file_formats, virtual_camera as vc};
use crate::errors::{CameraError, PhotoError};
use crate::orientation::VideoOrientation;
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Failure injected into `start_session`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupFault {
    DeviceUnavailable,
    ConfigurationRejected,
}

/// Failure injected into every capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFault {
    /// Complete without image data
    NoImageData,
    /// Fail with the given message
    Fail(String),
    /// Never complete
    Stall,
}

/// Where virtual frames come from
#[derive(Debug, Clone)]
enum FrameSource {
    Pattern,
    Still(Arc<DynamicImage>),
}

#[derive(Debug)]
struct VirtualState {
    running: bool,
    orientation: VideoOrientation,
    frame_counter: u32,
    setup_fault: Option<SetupFault>,
    capture_fault: Option<CaptureFault>,
    requests: Vec<CaptureSettings>,
    stalled: Vec<CaptureCompleter>,
}

/// Capture session backed by generated or still frames
#[derive(Debug)]
pub struct VirtualCaptureSession {
    name: String,
    source: FrameSource,
    state: Mutex<VirtualState>,
}

impl Default for VirtualCaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualCaptureSession {
    /// Session producing a moving test pattern
    pub fn new() -> Self {
        Self::with_source("Virtual camera".to_string(), FrameSource::Pattern)
    }

    /// Session returning the given still image for every capture
    pub fn from_image_file(path: &Path) -> Result<Self, CameraError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !file_formats::is_image_extension(extension) {
            return Err(CameraError::DeviceUnavailable(format!(
                "unsupported still image: {}",
                path.display()
            )));
        }

        let image = image::open(path).map_err(|e| {
            CameraError::DeviceUnavailable(format!("{}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), width = image.width(), height = image.height(), "Loaded still image for virtual camera");

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Still image".to_string());
        Ok(Self::with_source(name, FrameSource::Still(Arc::new(image))))
    }

    fn with_source(name: String, source: FrameSource) -> Self {
        Self {
            name,
            source,
            state: Mutex::new(VirtualState {
                running: false,
                orientation: VideoOrientation::default(),
                frame_counter: 0,
                setup_fault: None,
                capture_fault: None,
                requests: Vec::new(),
                stalled: Vec::new(),
            }),
        }
    }

    /// Make the next `start_session` fail
    pub fn with_setup_fault(self, fault: SetupFault) -> Self {
        self.state().setup_fault = Some(fault);
        self
    }

    /// Make every following capture fail (or stall) until cleared
    /// Replace the injected capture fault. Captures stalled by an earlier
    /// fault are abandoned.
    pub fn set_capture_fault(&self, fault: Option<CaptureFault>) {
        let mut state = self.state();
        state.capture_fault = fault;
        state.stalled.clear();
    }

    /// Settings of every capture requested so far, in order
    pub fn requested_settings(&self) -> Vec<CaptureSettings> {
        self.state().requests.clone()
    }

    pub fn capture_count(&self) -> usize {
        self.state().requests.len()
    }

    fn state(&self) -> MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CaptureSession for VirtualCaptureSession {
    fn name(&self) -> &str {
        &self.name
    }

    fn start_session(&self) -> Result<(), CameraError> {
        let mut state = self.state();
        if state.running {
            return Ok(());
        }

        match state.setup_fault {
            Some(SetupFault::DeviceUnavailable) => {
                return Err(CameraError::DeviceUnavailable(
                    "virtual camera has no device".to_string(),
                ));
            }
            Some(SetupFault::ConfigurationRejected) => {
                return Err(CameraError::ConfigurationRejected(
                    "virtual camera refused photo output".to_string(),
                ));
            }
            None => {}
        }

        state.running = true;
        info!(camera = %self.name, "Virtual capture session started");
        Ok(())
    }

    fn stop_session(&self) {
        let mut state = self.state();
        state.stalled.clear();
        if state.running {
            state.running = false;
            info!(camera = %self.name, "Virtual capture session stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.state().running
    }

    fn capture_photo(&self, settings: CaptureSettings) -> PendingCapture {
        let mut state = self.state();
        if !state.running {
            return PendingCapture::ready(Err(CameraError::NotRunning.into()));
        }

        state.requests.push(settings);
        state.frame_counter = state.frame_counter.wrapping_add(1);
        let frame_index = state.frame_counter;
        let orientation = state.orientation;

        match state.capture_fault.clone() {
            Some(CaptureFault::NoImageData) => {
                return PendingCapture::ready(Err(PhotoError::NoImageData));
            }
            Some(CaptureFault::Fail(msg)) => {
                return PendingCapture::ready(Err(PhotoError::CaptureFailed(msg)));
            }
            Some(CaptureFault::Stall) => {
                let (completer, pending) = PendingCapture::channel();
                state.stalled.push(completer);
                warn!("Virtual capture stalled on purpose");
                return pending;
            }
            None => {}
        }
        drop(state);

        let (completer, pending) = PendingCapture::channel();
        let source = self.source.clone();
        let render = move || {
            let frame = render_capture(&source, frame_index, &settings);
            let result = encode_jpeg(&apply_orientation(frame, orientation), vc::JPEG_QUALITY);
            if let Ok(image) = &result {
                debug!(bytes = image.len(), frame_index, "Virtual capture encoded");
            }
            completer.complete(result);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(render);
            }
            Err(_) => render(),
        }

        pending
    }

    fn set_orientation(&self, orientation: VideoOrientation) {
        self.state().orientation = orientation;
    }

    fn orientation(&self) -> VideoOrientation {
        self.state().orientation
    }

    fn latest_preview(&self) -> Option<RgbImage> {
        let mut state = self.state();
        if !state.running {
            return None;
        }
        state.frame_counter = state.frame_counter.wrapping_add(1);
        let frame_index = state.frame_counter;
        drop(state);

        let frame = match &self.source {
            FrameSource::Pattern => pattern_frame(vc::FRAME_WIDTH / 4, vc::FRAME_HEIGHT / 4, frame_index),
            FrameSource::Still(image) => image.thumbnail(vc::FRAME_WIDTH / 4, vc::FRAME_HEIGHT / 4).to_rgb8(),
        };
        Some(frame)
    }
}

fn render_capture(source: &FrameSource, frame_index: u32, settings: &CaptureSettings) -> DynamicImage {
    let scale = if settings.high_resolution { 2 } else { 1 };
    let mut frame = match source {
        FrameSource::Pattern => pattern_frame(vc::FRAME_WIDTH * scale, vc::FRAME_HEIGHT * scale, frame_index),
        FrameSource::Still(image) => image.to_rgb8(),
    };

    // Only a forced flash visibly brightens a virtual scene
    if settings.flash == FlashMode::On {
        for pixel in frame.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                *channel = channel.saturating_add(48);
            }
        }
    }

    DynamicImage::ImageRgb8(frame)
}

/// Colour gradient with a vertical bar that moves with `frame_index`
fn pattern_frame(width: u32, height: u32, frame_index: u32) -> RgbImage {
    let width = width.max(1);
    let height = height.max(1);
    let bar_width = (width / 16).max(1);
    let bar_x = (frame_index.wrapping_mul(bar_width)) % width;

    RgbImage::from_fn(width, height, |x, y| {
        if x >= bar_x && x < bar_x + bar_width {
            return Rgb([255, 255, 255]);
        }
        let r = (x * 255 / width) as u8;
        let g = (y * 255 / height) as u8;
        let b = 255 - r / 2 - g / 2;
        Rgb([r, g, b])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_capture_returns_jpeg() {
        let session = VirtualCaptureSession::new();
        session.start_session().unwrap();

        let image = session
            .capture_photo(CaptureSettings::SHAKE)
            .wait(WAIT)
            .await
            .unwrap();
        assert_eq!((image.width, image.height), (vc::FRAME_WIDTH, vc::FRAME_HEIGHT));
        assert_eq!(session.requested_settings(), vec![CaptureSettings::SHAKE]);
    }

    #[tokio::test]
    async fn test_high_resolution_doubles_size() {
        let session = VirtualCaptureSession::new();
        session.start_session().unwrap();
        let settings = CaptureSettings {
            high_resolution: true,
            ..CaptureSettings::SHAKE
        };
        let image = session.capture_photo(settings).wait(WAIT).await.unwrap();
        assert_eq!(image.width, vc::FRAME_WIDTH * 2);
    }

    #[tokio::test]
    async fn test_orientation_rotates_output() {
        let session = VirtualCaptureSession::new();
        session.start_session().unwrap();
        session.set_orientation(VideoOrientation::LandscapeLeft);

        let image = session
            .capture_photo(CaptureSettings::SHAKE)
            .wait(WAIT)
            .await
            .unwrap();
        assert_eq!((image.width, image.height), (vc::FRAME_HEIGHT, vc::FRAME_WIDTH));
    }

    #[tokio::test]
    async fn test_capture_before_start_fails() {
        let session = VirtualCaptureSession::new();
        let err = session
            .capture_photo(CaptureSettings::SHAKE)
            .wait(WAIT)
            .await
            .unwrap_err();
        assert_eq!(err, PhotoError::from(CameraError::NotRunning));
        assert_eq!(session.capture_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_capture_faults() {
        let session = VirtualCaptureSession::new();
        session.start_session().unwrap();

        session.set_capture_fault(Some(CaptureFault::NoImageData));
        let err = session.capture_photo(CaptureSettings::SHAKE).wait(WAIT).await;
        assert_eq!(err.unwrap_err(), PhotoError::NoImageData);

        session.set_capture_fault(Some(CaptureFault::Stall));
        let err = session
            .capture_photo(CaptureSettings::SHAKE)
            .wait(Duration::from_millis(20))
            .await;
        assert_eq!(err.unwrap_err(), PhotoError::Timeout);
    }

    #[tokio::test]
    async fn test_stalled_captures_are_abandoned() {
        let session = VirtualCaptureSession::new();
        session.start_session().unwrap();
        session.set_capture_fault(Some(CaptureFault::Stall));

        let first = session.capture_photo(CaptureSettings::SHAKE);
        session.set_capture_fault(None);
        assert_eq!(first.wait(WAIT).await.unwrap_err(), PhotoError::Abandoned);

        session.set_capture_fault(Some(CaptureFault::Stall));
        let second = session.capture_photo(CaptureSettings::SHAKE);
        session.stop_session();
        assert_eq!(second.wait(WAIT).await.unwrap_err(), PhotoError::Abandoned);
    }

    #[test]
    fn test_setup_faults() {
        let session = VirtualCaptureSession::new().with_setup_fault(SetupFault::DeviceUnavailable);
        assert!(matches!(
            session.start_session(),
            Err(CameraError::DeviceUnavailable(_))
        ));
        assert!(!session.is_running());

        let session =
            VirtualCaptureSession::new().with_setup_fault(SetupFault::ConfigurationRejected);
        assert!(matches!(
            session.start_session(),
            Err(CameraError::ConfigurationRejected(_))
        ));
    }

    #[test]
    fn test_preview_only_while_running() {
        let session = VirtualCaptureSession::new();
        assert!(session.latest_preview().is_none());
        session.start_session().unwrap();
        let preview = session.latest_preview().unwrap();
        assert_eq!(preview.width(), vc::FRAME_WIDTH / 4);
        session.stop_session();
        assert!(session.latest_preview().is_none());
    }

    #[test]
    fn test_unsupported_still_is_rejected() {
        let err = VirtualCaptureSession::from_image_file(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, CameraError::DeviceUnavailable(_)));
    }
}
