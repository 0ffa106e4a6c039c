// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture session
//!
//! Streams MJPEG (or YUYV as a fallback) from a `/dev/videoN` device on a
//! dedicated capture thread. The thread keeps the newest frame for preview
//! and answers pending photo requests with the first frame that arrives
//! after the request, so a capture never blocks the preview.

use super::types::{
    CaptureSettings, CapturedImage, FlashMode, ImageFormat, apply_orientation, encode_jpeg,
};
use super::{CaptureCompleter, CaptureSession, PendingCapture};
use crate::constants::{timing, virtual_camera as vc};
use crate::errors::{CameraError, PhotoError};
use crate::flash::{self, FlashDevice};
use crate::orientation::VideoOrientation;
use image::{DynamicImage, RgbImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

const MJPG: &[u8; 4] = b"MJPG";
const YUYV: &[u8; 4] = b"YUYV";

/// Frames skipped after turning the flash LED on so exposure can adapt
const FLASH_SETTLE_FRAMES: usize = 2;

/// V4L2 device description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device path (e.g., /dev/video0)
    pub path: String,
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
}

/// List `/dev/video*` nodes that answer QUERYCAP, sorted by path
pub fn list_devices() -> Vec<DeviceInfo> {
    let mut paths: Vec<String> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.starts_with("video").then(|| format!("/dev/{}", name))
        })
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| {
            let dev = Device::with_path(&path).ok()?;
            let caps = dev.query_caps().ok()?;
            Some(DeviceInfo {
                path,
                card: caps.card,
                driver: caps.driver,
            })
        })
        .collect()
}

/// Raw frame as delivered by the driver
#[derive(Clone)]
struct RawFrame {
    seq: u64,
    fourcc: FourCC,
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

struct PendingRequest {
    completer: CaptureCompleter,
    settings: CaptureSettings,
    skip_frames: usize,
}

#[derive(Default)]
struct Shared {
    latest: Mutex<Option<RawFrame>>,
    pending: Mutex<Vec<PendingRequest>>,
    orientation: Mutex<VideoOrientation>,
    preview_cache: Mutex<Option<(u64, RgbImage)>>,
    stop: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Capture session on a V4L2 video device
pub struct V4l2CaptureSession {
    path: String,
    name: String,
    width: u32,
    height: u32,
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    flash_devices: Vec<FlashDevice>,
}

impl V4l2CaptureSession {
    /// Session for `path` at the requested resolution (the driver may adjust it)
    pub fn new(path: impl Into<String>, width: u32, height: u32) -> Self {
        let path = path.into();
        Self {
            name: path.clone(),
            path,
            width,
            height,
            shared: Arc::new(Shared::default()),
            thread: Mutex::new(None),
            flash_devices: FlashDevice::discover(),
        }
    }

    /// Session at the default virtual frame size
    pub fn with_default_format(path: impl Into<String>) -> Self {
        Self::new(path, vc::FRAME_WIDTH, vc::FRAME_HEIGHT)
    }

    fn negotiate_format(&self, dev: &Device) -> Result<Format, CameraError> {
        for fourcc in [MJPG, YUYV] {
            let wanted = Format::new(self.width, self.height, FourCC::new(fourcc));
            match dev.set_format(&wanted) {
                Ok(actual) if actual.fourcc == FourCC::new(fourcc) => return Ok(actual),
                Ok(actual) => {
                    debug!(wanted = ?wanted.fourcc, got = ?actual.fourcc, "Driver substituted pixel format");
                }
                Err(e) => {
                    debug!(fourcc = ?FourCC::new(fourcc), error = %e, "Pixel format refused");
                }
            }
        }
        Err(CameraError::ConfigurationRejected(format!(
            "{} supports neither MJPG nor YUYV",
            self.path
        )))
    }
}

impl CaptureSession for V4l2CaptureSession {
    fn name(&self) -> &str {
        &self.name
    }

    fn start_session(&self) -> Result<(), CameraError> {
        let mut thread = lock(&self.thread);
        if thread.is_some() {
            return Ok(());
        }

        let dev = Device::with_path(&self.path)
            .map_err(|e| CameraError::DeviceUnavailable(format!("{}: {}", self.path, e)))?;
        let format = self.negotiate_format(&dev)?;
        info!(
            path = %self.path,
            width = format.width,
            height = format.height,
            fourcc = ?format.fourcc,
            "V4L2 format configured"
        );

        self.shared.stop.store(false, Ordering::SeqCst);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let flash_devices = self.flash_devices.clone();

        let handle = std::thread::Builder::new()
            .name("v4l2-capture".to_string())
            .spawn(move || capture_loop(dev, format, shared, flash_devices, ready_tx))
            .map_err(|e| CameraError::BackendError(e.to_string()))?;

        match ready_rx.recv_timeout(timing::SESSION_START_TIMEOUT) {
            Ok(Ok(())) => {
                *thread = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                self.shared.stop.store(true, Ordering::SeqCst);
                Err(CameraError::BackendError(format!(
                    "{} did not start streaming",
                    self.path
                )))
            }
        }
    }

    fn stop_session(&self) {
        let Some(handle) = lock(&self.thread).take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            error!(path = %self.path, "V4L2 capture thread panicked");
        }
        flash::all_off(&self.flash_devices);
        // Requests still waiting for a frame are abandoned
        lock(&self.shared.pending).clear();
        *lock(&self.shared.latest) = None;
        info!(path = %self.path, "V4L2 capture session stopped");
    }

    fn is_running(&self) -> bool {
        lock(&self.thread).is_some()
    }

    fn capture_photo(&self, settings: CaptureSettings) -> PendingCapture {
        if !self.is_running() {
            return PendingCapture::ready(Err(CameraError::NotRunning.into()));
        }

        let skip_frames = if settings.flash == FlashMode::On && !self.flash_devices.is_empty() {
            flash::all_on(&self.flash_devices);
            FLASH_SETTLE_FRAMES
        } else {
            0
        };

        let (completer, pending) = PendingCapture::channel();
        lock(&self.shared.pending).push(PendingRequest {
            completer,
            settings,
            skip_frames,
        });
        pending
    }

    fn set_orientation(&self, orientation: VideoOrientation) {
        *lock(&self.shared.orientation) = orientation;
    }

    fn orientation(&self) -> VideoOrientation {
        *lock(&self.shared.orientation)
    }

    fn latest_preview(&self) -> Option<RgbImage> {
        let frame = lock(&self.shared.latest).clone()?;

        let mut cache = lock(&self.shared.preview_cache);
        if let Some((seq, image)) = cache.as_ref()
            && *seq == frame.seq
        {
            return Some(image.clone());
        }

        let preview = match decode_frame(&frame) {
            Ok(image) => image
                .thumbnail(vc::FRAME_WIDTH / 2, vc::FRAME_HEIGHT / 2)
                .to_rgb8(),
            Err(e) => {
                debug!(error = %e, "Skipping undecodable preview frame");
                return cache.as_ref().map(|(_, image)| image.clone());
            }
        };
        *cache = Some((frame.seq, preview.clone()));
        Some(preview)
    }
}

impl Drop for V4l2CaptureSession {
    fn drop(&mut self) {
        self.stop_session();
    }
}

fn capture_loop(
    dev: Device,
    format: Format,
    shared: Arc<Shared>,
    flash_devices: Vec<FlashDevice>,
    ready: std::sync::mpsc::Sender<Result<(), CameraError>>,
) {
    let mut stream = match Stream::with_buffers(&dev, Type::VideoCapture, 4) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(CameraError::ConfigurationRejected(format!(
                "failed to create capture stream: {}",
                e
            ))));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut seq: u64 = 0;
    let mut warmup = timing::V4L2_WARMUP_FRAMES;

    while !shared.stop.load(Ordering::SeqCst) {
        let (buf, meta) = match stream.next() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to capture frame");
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        let used = (meta.bytesused as usize).min(buf.len());
        if warmup > 0 || used == 0 {
            warmup = warmup.saturating_sub(1);
            continue;
        }

        seq += 1;
        let frame = RawFrame {
            seq,
            fourcc: format.fourcc,
            width: format.width,
            height: format.height,
            data: Arc::from(&buf[..used]),
        };
        *lock(&shared.latest) = Some(frame.clone());

        let ready_requests = {
            let mut pending = lock(&shared.pending);
            let mut ready_now = Vec::new();
            let mut waiting = Vec::new();
            for mut request in pending.drain(..) {
                if request.skip_frames == 0 {
                    ready_now.push(request);
                } else {
                    request.skip_frames -= 1;
                    waiting.push(request);
                }
            }
            *pending = waiting;
            ready_now
        };

        if ready_requests.is_empty() {
            continue;
        }

        let orientation = *lock(&shared.orientation);
        let used_flash = ready_requests
            .iter()
            .any(|r| r.settings.flash == FlashMode::On);
        for request in ready_requests {
            if request.completer.is_abandoned() {
                continue;
            }
            request.completer.complete(finish_capture(&frame, orientation));
        }
        if used_flash {
            flash::all_off(&flash_devices);
        }
    }

    debug!("V4L2 capture loop exited");
}

/// Turn a raw frame into the delivered photo
fn finish_capture(
    frame: &RawFrame,
    orientation: VideoOrientation,
) -> Result<CapturedImage, PhotoError> {
    if frame.data.is_empty() {
        return Err(PhotoError::NoImageData);
    }

    // MJPEG frames are already a photo when no rotation is needed
    if frame.fourcc == FourCC::new(MJPG) && orientation.rotation_degrees() == 0 {
        return Ok(CapturedImage::new(
            frame.data.to_vec(),
            ImageFormat::Jpeg,
            frame.width,
            frame.height,
        ));
    }

    let image = decode_frame(frame)?;
    encode_jpeg(&apply_orientation(image, orientation), vc::JPEG_QUALITY)
}

fn decode_frame(frame: &RawFrame) -> Result<DynamicImage, PhotoError> {
    if frame.fourcc == FourCC::new(MJPG) {
        return Ok(image::load_from_memory_with_format(
            &frame.data,
            image::ImageFormat::Jpeg,
        )?);
    }

    let rgb = yuyv_to_rgb(&frame.data, frame.width, frame.height).ok_or_else(|| {
        PhotoError::CaptureFailed(format!(
            "short YUYV frame: {} bytes for {}x{}",
            frame.data.len(),
            frame.width,
            frame.height
        ))
    })?;
    Ok(DynamicImage::ImageRgb8(rgb))
}

/// Packed 4:2:2 (Y0 U Y1 V) to RGB
fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Option<RgbImage> {
    let needed = (width as usize) * (height as usize) * 2;
    if data.len() < needed {
        return None;
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..needed].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        let (r, g, b) = yuv_to_rgb(y0, u, v);
        rgb.extend_from_slice(&[r, g, b]);
        let (r, g, b) = yuv_to_rgb(y1, u, v);
        rgb.extend_from_slice(&[r, g, b]);
    }
    RgbImage::from_raw(width, height, rgb)
}

/// Convert YUV (BT.601) to RGB
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv_gray_stays_gray() {
        assert_eq!(yuv_to_rgb(128, 128, 128), (128, 128, 128));
        assert_eq!(yuv_to_rgb(0, 128, 128), (0, 0, 0));
    }

    #[test]
    fn test_yuyv_conversion_size() {
        let data = vec![128u8; 4 * 2 * 2];
        let rgb = yuyv_to_rgb(&data, 4, 2).unwrap();
        assert_eq!(rgb.dimensions(), (4, 2));
        assert!(yuyv_to_rgb(&data[..8], 4, 2).is_none());
    }

    #[test]
    fn test_finish_capture_passes_mjpeg_through() {
        let jpeg = encode_jpeg(&DynamicImage::new_rgb8(8, 4), 80).unwrap();
        let frame = RawFrame {
            seq: 1,
            fourcc: FourCC::new(MJPG),
            width: 8,
            height: 4,
            data: jpeg.data.clone(),
        };

        let upright = finish_capture(&frame, VideoOrientation::Portrait).unwrap();
        assert_eq!(upright.data, jpeg.data);

        let rotated = finish_capture(&frame, VideoOrientation::LandscapeRight).unwrap();
        assert_eq!((rotated.width, rotated.height), (4, 8));
    }

    #[test]
    fn test_empty_frame_has_no_image_data() {
        let frame = RawFrame {
            seq: 1,
            fourcc: FourCC::new(YUYV),
            width: 2,
            height: 2,
            data: Arc::from(Vec::<u8>::new()),
        };
        assert_eq!(
            finish_capture(&frame, VideoOrientation::Portrait).unwrap_err(),
            PhotoError::NoImageData
        );
    }

    #[test]
    fn test_missing_device_is_unavailable() {
        let session = V4l2CaptureSession::with_default_format("/dev/shake-camera-missing");
        assert!(matches!(
            session.start_session(),
            Err(CameraError::DeviceUnavailable(_))
        ));
        assert!(!session.is_running());
    }
}
