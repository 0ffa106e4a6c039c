// SPDX-License-Identifier: GPL-3.0-only

//! Motion sensing backends
//!
//! A [`MotionSource`] produces user-acceleration samples (gravity removed,
//! in g) at a fixed interval. Samples are delivered as a stream so the
//! consumer decides when to stop listening; calling
//! [`MotionSource::stop_updates`] ends the stream from the sensor side.
//!
//! - [`scripted`]: replays a fixed list of readings (tests, `replay`, demos)
//! - [`iio`]: Linux Industrial I/O accelerometer via sysfs

pub mod iio;
pub mod scripted;

pub use iio::IioAccelerometer;
pub use scripted::ScriptedMotionSource;

use crate::errors::MotionError;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// 3-axis acceleration in units of g
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Acceleration {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// One user-acceleration reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Time since the update stream started
    pub timestamp: Duration,
    pub acceleration: Acceleration,
}

impl MotionSample {
    /// Sample at the start of the stream
    pub fn new(acceleration: Acceleration) -> Self {
        Self::at(Duration::ZERO, acceleration)
    }

    pub fn at(timestamp: Duration, acceleration: Acceleration) -> Self {
        Self {
            timestamp,
            acceleration,
        }
    }
}

/// A sample, or the reason it could not be read
pub type MotionReading = Result<MotionSample, MotionError>;

/// Stream of readings returned by [`MotionSource::start_updates`]
pub type MotionStream = BoxStream<'static, MotionReading>;

/// Motion sensing service
pub trait MotionSource: Send + Sync {
    /// Human-readable sensor name for logs and the status bar
    fn name(&self) -> &str;

    /// Start producing one reading per `interval`.
    ///
    /// Must be called from within a Tokio runtime. Starting again replaces
    /// (and ends) any stream handed out earlier.
    fn start_updates(&self, interval: Duration) -> Result<MotionStream, MotionError>;

    /// End the stream handed out by the last `start_updates`
    fn stop_updates(&self);
}

/// Stop flag shared between a source and the stream it handed out
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    sender: Mutex<Option<watch::Sender<bool>>>,
}

impl StopSignal {
    /// Stop any previous stream and return a receiver for a new one
    pub(crate) fn arm(&self) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        let mut guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = guard.replace(tx) {
            let _ = previous.send(true);
        }
        rx
    }

    pub(crate) fn fire(&self) {
        let guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(true);
        }
    }
}

/// Ticker shared by the sources: first tick fires immediately, late ticks
/// are delayed rather than bunched up.
pub(crate) fn sample_ticker(interval: Duration) -> tokio::time::Interval {
    // tokio panics on a zero period
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker
}
