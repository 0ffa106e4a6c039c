// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::CaptureSettings;
use crate::constants::{self, CONFIG_DIR_NAME, DEFAULT_SHARE_TEXT};
use crate::errors::{AppError, AppResult};
use crate::policy::ShakePolicy;
use crate::storage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Current on-disk config layout
pub const CONFIG_VERSION: u32 = 1;

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Layout version of the saved file
    pub version: u32,
    /// Shake-to-capture enabled
    pub shake_enabled: bool,
    /// Rounded x acceleration (in g) that must be exceeded
    pub shake_threshold: f64,
    /// Decimal places used when rounding the x acceleration
    pub rounding_decimals: u32,
    /// Motion sample period
    pub motion_interval_ms: u64,
    /// How long a capture may take before it is reported as failed
    pub capture_timeout_ms: u64,
    /// Settings for shake-triggered captures
    pub shake_capture: CaptureSettings,
    /// Settings for manual captures
    pub manual_capture: CaptureSettings,
    /// Photo directory (None = ~/Pictures/ShakeCamera)
    pub save_folder: Option<PathBuf>,
    /// V4L2 device used by the camera session
    pub camera_device: String,
    /// Still image served by the virtual camera (None = test pattern)
    pub virtual_still: Option<PathBuf>,
    /// Text attached when sharing
    pub share_text: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            shake_enabled: true,
            shake_threshold: constants::shake::THRESHOLD_G,
            rounding_decimals: constants::shake::ROUNDING_DECIMALS,
            motion_interval_ms: constants::shake::UPDATE_INTERVAL.as_millis() as u64,
            capture_timeout_ms: constants::timing::CAPTURE_TIMEOUT.as_millis() as u64,
            shake_capture: CaptureSettings::SHAKE,
            manual_capture: CaptureSettings::SHAKE,
            save_folder: None,
            camera_device: "/dev/video0".to_string(),
            virtual_still: None,
            share_text: DEFAULT_SHARE_TEXT.to_string(),
        }
    }
}

impl Config {
    /// `~/.config/shake-camera/config.json`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the user's config, falling back to defaults when it is missing
    /// or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            warn!("No config directory, using defaults");
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    warn!(path = %path.display(), error = %e, "Errors loading config, using defaults");
                } else {
                    debug!(path = %path.display(), "No config file, using defaults");
                }
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;

        if config.version > CONFIG_VERSION {
            return Err(AppError::Config(format!(
                "config version {} is newer than supported version {}",
                config.version, CONFIG_VERSION
            )));
        }
        Ok(config)
    }

    pub fn save(&self) -> AppResult<()> {
        let path = Self::config_path()
            .ok_or_else(|| AppError::Config("no config directory".to_string()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    pub fn policy(&self) -> ShakePolicy {
        ShakePolicy::new(self.shake_threshold, self.rounding_decimals)
    }

    pub fn motion_interval(&self) -> Duration {
        Duration::from_millis(self.motion_interval_ms.max(1))
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    /// Where photos are written
    pub fn photo_dir(&self) -> PathBuf {
        self.save_folder
            .clone()
            .unwrap_or_else(storage::default_photo_dir)
    }
}
