// SPDX-License-Identifier: GPL-3.0-only
// Shared types for capture session backends

//! Shared types for capture sessions

use crate::errors::PhotoError;
use crate::orientation::VideoOrientation;
use chrono::{DateTime, Local};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Flash behaviour for a single capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlashMode {
    /// Let the session decide from the scene
    #[default]
    Auto,
    /// Always fire
    On,
    /// Never fire
    Off,
}

impl FlashMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            FlashMode::Auto => "Auto",
            FlashMode::On => "On",
            FlashMode::Off => "Off",
        }
    }
}

/// Options applied to one capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSettings {
    pub flash: FlashMode,
    pub stabilization: bool,
    pub high_resolution: bool,
}

impl CaptureSettings {
    /// The fixed configuration used for every shake-triggered capture:
    /// automatic flash, stabilization on, standard resolution.
    pub const SHAKE: CaptureSettings = CaptureSettings {
        flash: FlashMode::Auto,
        stabilization: true,
        high_resolution: false,
    };
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::SHAKE
    }
}

/// Encoded image container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

/// Unique id of one capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureRequestId(uuid::Uuid);

impl CaptureRequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for CaptureRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CaptureRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to correlate log lines
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Encoded photo delivered by a capture session
///
/// The bytes are reference counted so the image can be handed to the saver
/// and the UI without copying.
#[derive(Clone)]
pub struct CapturedImage {
    pub data: Arc<[u8]>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Local>,
}

impl CapturedImage {
    pub fn new(data: Vec<u8>, format: ImageFormat, width: u32, height: u32) -> Self {
        Self {
            data: Arc::from(data.into_boxed_slice()),
            format,
            width,
            height,
            captured_at: Local::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedImage")
            .field("bytes", &self.data.len())
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// Rotate sensor output to the requested capture orientation
pub fn apply_orientation(image: DynamicImage, orientation: VideoOrientation) -> DynamicImage {
    match orientation.rotation_degrees() {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    }
}

/// Encode an image as JPEG (alpha is dropped)
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<CapturedImage, PhotoError> {
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder.encode_image(&rgb)?;

    if bytes.is_empty() {
        return Err(PhotoError::NoImageData);
    }

    Ok(CapturedImage::new(
        bytes,
        ImageFormat::Jpeg,
        rgb.width(),
        rgb.height(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shake_settings_are_fixed() {
        let settings = CaptureSettings::default();
        assert_eq!(settings.flash, FlashMode::Auto);
        assert!(settings.stabilization);
        assert!(!settings.high_resolution);
    }

    #[test]
    fn test_landscape_orientation_swaps_dimensions() {
        let image = DynamicImage::new_rgb8(40, 30);
        let rotated = apply_orientation(image.clone(), VideoOrientation::LandscapeRight);
        assert_eq!((rotated.width(), rotated.height()), (30, 40));

        let upright = apply_orientation(image, VideoOrientation::Portrait);
        assert_eq!((upright.width(), upright.height()), (40, 30));
    }

    #[test]
    fn test_encode_jpeg_produces_decodable_bytes() {
        let image = DynamicImage::new_rgb8(16, 8);
        let captured = encode_jpeg(&image, 80).unwrap();
        assert_eq!(captured.format, ImageFormat::Jpeg);
        assert_eq!(&captured.data[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&captured.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(CaptureRequestId::new(), CaptureRequestId::new());
        assert_eq!(CaptureRequestId::new().to_string().len(), 8);
    }
}
