// SPDX-License-Identifier: GPL-3.0-only

//! Scripted motion source
//!
//! Replays a fixed list of readings at the requested interval, then ends the
//! stream. Scripts can be loaded from JSON, where each entry is either a bare
//! number (x acceleration), an object `{"x": .., "y": .., "z": ..}`, or
//! `{"error": ".."}` for a failed read:
//!
//! ```json
//! [0.1, 0.3, {"x": 0.6, "y": 0.02}, {"error": "bus timeout"}, 0.2]
//! ```

use super::{Acceleration, MotionReading, MotionSample, MotionSource, MotionStream, StopSignal};
use crate::errors::{AppError, MotionError};
use futures::StreamExt;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptEntry {
    X(f64),
    Error { error: String },
    Sample(Acceleration),
}

impl From<ScriptEntry> for Result<Acceleration, MotionError> {
    fn from(entry: ScriptEntry) -> Self {
        match entry {
            ScriptEntry::X(x) => Ok(Acceleration::new(x, 0.0, 0.0)),
            ScriptEntry::Sample(acceleration) => Ok(acceleration),
            ScriptEntry::Error { error } => Err(MotionError::ReadFailed(error)),
        }
    }
}

/// Motion source replaying a fixed script
#[derive(Debug, Default)]
pub struct ScriptedMotionSource {
    script: Vec<Result<Acceleration, MotionError>>,
    stop: StopSignal,
}

impl ScriptedMotionSource {
    pub fn new(script: Vec<Result<Acceleration, MotionError>>) -> Self {
        Self {
            script,
            stop: StopSignal::default(),
        }
    }

    /// Script of samples with only the x axis set
    pub fn from_x_values(xs: &[f64]) -> Self {
        Self::new(
            xs.iter()
                .map(|&x| Ok(Acceleration::new(x, 0.0, 0.0)))
                .collect(),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let entries: Vec<ScriptEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries.into_iter().map(Into::into).collect()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    /// Readings with timestamps spaced by `interval`, without any waiting
    pub fn readings(&self, interval: Duration) -> Vec<MotionReading> {
        self.script
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                entry
                    .clone()
                    .map(|acceleration| MotionSample::at(interval * i as u32, acceleration))
            })
            .collect()
    }
}

impl MotionSource for ScriptedMotionSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn start_updates(&self, interval: Duration) -> Result<MotionStream, MotionError> {
        let readings = self.readings(interval);
        let mut stop = self.stop.arm();
        debug!(count = readings.len(), ?interval, "Starting scripted motion updates");

        let stream = async_stream::stream! {
            let mut ticker = super::sample_ticker(interval);
            for reading in readings {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.changed() => break,
                }
                yield reading;
            }
        };

        Ok(stream.boxed())
    }

    fn stop_updates(&self) {
        self.stop.fire();
    }
}
