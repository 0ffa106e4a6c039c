// SPDX-License-Identifier: GPL-3.0-only

//! Flash LEDs for shake and manual captures
//!
//! Flash LEDs are exposed by the kernel at `/sys/class/leds/*:flash`. A
//! capture with `FlashMode::On` drives every one of them to full brightness
//! through the torch `brightness` file and turns them off once the frame is
//! taken.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LEDS_DIR: &str = "/sys/class/leds";

/// A `*:flash` LED class device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashDevice {
    name: String,
    brightness: PathBuf,
    max_brightness: u32,
}

impl FlashDevice {
    pub fn discover() -> Vec<FlashDevice> {
        Self::discover_in(Path::new(LEDS_DIR))
    }

    /// Flash LEDs under `leds_dir`, sorted by name. LEDs reporting a zero or
    /// unreadable `max_brightness` are skipped.
    pub fn discover_in(leds_dir: &Path) -> Vec<FlashDevice> {
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            debug!(dir = %leds_dir.display(), "No LED class dir, capturing without flash");
            return Vec::new();
        };

        let mut devices: Vec<FlashDevice> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                if !name.ends_with(":flash") {
                    return None;
                }
                let dir = entry.path();
                let max_brightness = std::fs::read_to_string(dir.join("max_brightness"))
                    .ok()?
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|&max| max > 0)?;
                debug!(name, max_brightness, "Found flash LED");
                Some(FlashDevice {
                    name,
                    brightness: dir.join("brightness"),
                    max_brightness,
                })
            })
            .collect();

        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn write_brightness(&self, value: u32) -> io::Result<()> {
        std::fs::write(&self.brightness, value.to_string())
    }
}

/// Light every flash LED at full brightness
pub fn all_on(devices: &[FlashDevice]) {
    for dev in devices {
        if let Err(e) = dev.write_brightness(dev.max_brightness) {
            warn!(device = %dev.name, error = %e, "Flash LED not writable, user may need to be in 'feedbackd' group");
        }
    }
}

pub fn all_off(devices: &[FlashDevice]) {
    for dev in devices {
        if let Err(e) = dev.write_brightness(0) {
            warn!(device = %dev.name, error = %e, "Failed to turn off flash LED");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_leds() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shake-camera-leds-{}", uuid::Uuid::new_v4()));
        for (name, max) in [
            ("yellow:flash", "16"),
            ("white:flash", "255"),
            ("blue:flash", "0"),
            ("red:status", "1"),
        ] {
            let led = dir.join(name);
            std::fs::create_dir_all(&led).unwrap();
            std::fs::write(led.join("max_brightness"), max).unwrap();
            std::fs::write(led.join("brightness"), "0").unwrap();
        }
        dir
    }

    #[test]
    fn test_discover_keeps_usable_flash_leds_in_order() {
        let dir = fake_leds();
        let devices = FlashDevice::discover_in(&dir);
        let names: Vec<&str> = devices.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["white:flash", "yellow:flash"]);
    }

    #[test]
    fn test_all_on_uses_each_max_then_all_off_resets() {
        let dir = fake_leds();
        let devices = FlashDevice::discover_in(&dir);
        let read = |name: &str| std::fs::read_to_string(dir.join(name).join("brightness")).unwrap();

        all_on(&devices);
        assert_eq!(read("white:flash"), "255");
        assert_eq!(read("yellow:flash"), "16");

        all_off(&devices);
        assert_eq!(read("white:flash"), "0");
        assert_eq!(read("yellow:flash"), "0");
    }

    #[test]
    fn test_missing_leds_dir_yields_nothing() {
        let devices = FlashDevice::discover_in(Path::new("/nonexistent/shake-camera-leds"));
        assert!(devices.is_empty());
    }
}
