// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Shake detection constants
pub mod shake {
    use super::Duration;

    /// Rounded x-axis user acceleration (in g) that must be exceeded to fire
    pub const THRESHOLD_G: f64 = 0.5;

    /// Decimal places the x-axis acceleration is rounded to before comparison
    pub const ROUNDING_DECIMALS: u32 = 3;

    /// Period between motion samples
    pub const UPDATE_INTERVAL: Duration = Duration::from_millis(100);
}

/// Capture timing constants
pub mod timing {
    use super::Duration;

    /// Upper bound on how long a capture completion may take
    pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

    /// How long a V4L2 device may take to start streaming
    pub const SESSION_START_TIMEOUT: Duration = Duration::from_secs(5);

    /// Frames discarded after the V4L2 stream starts (auto exposure settling)
    pub const V4L2_WARMUP_FRAMES: usize = 3;

    /// Terminal redraw / input poll interval
    pub const UI_POLL_INTERVAL: Duration = Duration::from_millis(16);
}

/// Channel sizes
pub mod channels {
    /// Undelivered capture events kept for the host
    pub const EVENT_BUFFER: usize = 64;
}

/// Motion sensor constants
pub mod motion {
    /// Standard gravity in m/s², used to convert IIO readings to g
    pub const STANDARD_GRAVITY: f64 = 9.806_65;

    /// Low-pass smoothing factor for the gravity estimate (0..1, higher = slower)
    pub const GRAVITY_FILTER_ALPHA: f64 = 0.8;
}

/// Virtual camera constants
pub mod virtual_camera {
    /// Width of generated frames
    pub const FRAME_WIDTH: u32 = 640;

    /// Height of generated frames
    pub const FRAME_HEIGHT: u32 = 480;

    /// JPEG quality for encoded captures
    pub const JPEG_QUALITY: u8 = 90;
}

/// Default folder name for saving photos (below the user's Pictures dir)
pub const DEFAULT_SAVE_FOLDER: &str = "ShakeCamera";

/// Application directory name under the user's config dir
pub const CONFIG_DIR_NAME: &str = "shake-camera";

/// Text attached to shared photos
pub const DEFAULT_SHARE_TEXT: &str = "Taken with Shake Camera";

/// Supported still image file formats
pub mod file_formats {
    /// Image extensions accepted as a still source for the virtual camera
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension_is_case_insensitive() {
        assert!(file_formats::is_image_extension("JPG"));
        assert!(file_formats::is_image_extension("png"));
        assert!(!file_formats::is_image_extension("mp4"));
    }

    #[test]
    fn test_update_interval_is_a_tenth_of_a_second() {
        assert_eq!(shake::UPDATE_INTERVAL.as_millis(), 100);
    }
}
