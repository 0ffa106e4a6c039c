// SPDX-License-Identifier: GPL-3.0-only

//! Device orientation tracking
//!
//! Orientation changes are published on an [`OrientationObserver`] and
//! consumers subscribe to it directly. The camera context forwards every
//! mappable change to the capture session so photos come out upright.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Physical orientation of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceOrientation {
    #[default]
    Unknown,
    Portrait,
    PortraitUpsideDown,
    /// Device rotated so the top points left
    LandscapeLeft,
    /// Device rotated so the top points right
    LandscapeRight,
    FaceUp,
    FaceDown,
}

impl DeviceOrientation {
    /// Capture orientation matching this device orientation.
    ///
    /// Device landscape and capture landscape are mirrored: a device turned
    /// to landscape-left records landscape-right. Flat and unknown
    /// orientations keep whatever the capture currently uses.
    pub fn video_orientation(self) -> Option<VideoOrientation> {
        match self {
            DeviceOrientation::Portrait => Some(VideoOrientation::Portrait),
            DeviceOrientation::PortraitUpsideDown => Some(VideoOrientation::PortraitUpsideDown),
            DeviceOrientation::LandscapeLeft => Some(VideoOrientation::LandscapeRight),
            DeviceOrientation::LandscapeRight => Some(VideoOrientation::LandscapeLeft),
            DeviceOrientation::Unknown | DeviceOrientation::FaceUp | DeviceOrientation::FaceDown => {
                None
            }
        }
    }

    /// Next orientation in a clockwise turn (flat/unknown start at portrait)
    pub fn rotated_clockwise(self) -> Self {
        match self {
            DeviceOrientation::Portrait => DeviceOrientation::LandscapeLeft,
            DeviceOrientation::LandscapeLeft => DeviceOrientation::PortraitUpsideDown,
            DeviceOrientation::PortraitUpsideDown => DeviceOrientation::LandscapeRight,
            DeviceOrientation::LandscapeRight => DeviceOrientation::Portrait,
            _ => DeviceOrientation::Portrait,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DeviceOrientation::Unknown => "Unknown",
            DeviceOrientation::Portrait => "Portrait",
            DeviceOrientation::PortraitUpsideDown => "Upside down",
            DeviceOrientation::LandscapeLeft => "Landscape left",
            DeviceOrientation::LandscapeRight => "Landscape right",
            DeviceOrientation::FaceUp => "Face up",
            DeviceOrientation::FaceDown => "Face down",
        }
    }
}

/// Orientation applied to captured photos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl VideoOrientation {
    /// Clockwise rotation applied to sensor output
    pub fn rotation_degrees(self) -> u16 {
        match self {
            VideoOrientation::Portrait => 0,
            VideoOrientation::LandscapeRight => 90,
            VideoOrientation::PortraitUpsideDown => 180,
            VideoOrientation::LandscapeLeft => 270,
        }
    }
}

/// Publishes device orientation changes to any number of subscribers
#[derive(Debug, Clone)]
pub struct OrientationObserver {
    sender: watch::Sender<DeviceOrientation>,
}

impl Default for OrientationObserver {
    fn default() -> Self {
        Self::new(DeviceOrientation::Unknown)
    }
}

impl OrientationObserver {
    pub fn new(initial: DeviceOrientation) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Report a new orientation. Repeats of the current value are ignored.
    pub fn publish(&self, orientation: DeviceOrientation) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == orientation {
                false
            } else {
                *current = orientation;
                true
            }
        });
        if changed {
            debug!(orientation = ?orientation, "Device orientation changed");
        }
    }

    pub fn current(&self) -> DeviceOrientation {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceOrientation> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_is_mirrored() {
        assert_eq!(
            DeviceOrientation::LandscapeLeft.video_orientation(),
            Some(VideoOrientation::LandscapeRight)
        );
        assert_eq!(
            DeviceOrientation::LandscapeRight.video_orientation(),
            Some(VideoOrientation::LandscapeLeft)
        );
    }

    #[test]
    fn test_portrait_maps_directly() {
        assert_eq!(
            DeviceOrientation::Portrait.video_orientation(),
            Some(VideoOrientation::Portrait)
        );
        assert_eq!(
            DeviceOrientation::PortraitUpsideDown.video_orientation(),
            Some(VideoOrientation::PortraitUpsideDown)
        );
    }

    #[test]
    fn test_flat_and_unknown_leave_orientation_alone() {
        for o in [
            DeviceOrientation::Unknown,
            DeviceOrientation::FaceUp,
            DeviceOrientation::FaceDown,
        ] {
            assert_eq!(o.video_orientation(), None);
        }
    }

    #[test]
    fn test_clockwise_turns_cycle() {
        let mut o = DeviceOrientation::Portrait;
        for _ in 0..4 {
            o = o.rotated_clockwise();
        }
        assert_eq!(o, DeviceOrientation::Portrait);
        assert_eq!(
            DeviceOrientation::FaceUp.rotated_clockwise(),
            DeviceOrientation::Portrait
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_once() {
        let observer = OrientationObserver::default();
        let mut rx = observer.subscribe();

        observer.publish(DeviceOrientation::LandscapeLeft);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), DeviceOrientation::LandscapeLeft);

        // Same value again is not a change
        observer.publish(DeviceOrientation::LandscapeLeft);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(observer.current(), DeviceOrientation::LandscapeLeft);
    }
}
