// SPDX-License-Identifier: GPL-3.0-only

//! Shake-triggered capture policy
//!
//! Decides, one motion sample at a time, whether a photo should be taken.
//! The decision only looks at the x axis: it is rounded to a fixed number of
//! decimal places and compared against the shake threshold. There is no
//! memory between samples, so two consecutive spikes produce two captures.

use crate::backends::motion::MotionSample;
use crate::constants::shake;

/// Outcome of evaluating one motion sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTrigger {
    /// Take a photo now
    Capture,
    /// Do nothing
    Ignore,
}

impl CaptureTrigger {
    /// Whether this decision asks for a capture
    pub fn fires(self) -> bool {
        matches!(self, CaptureTrigger::Capture)
    }
}

impl From<bool> for CaptureTrigger {
    fn from(fire: bool) -> Self {
        if fire {
            CaptureTrigger::Capture
        } else {
            CaptureTrigger::Ignore
        }
    }
}

/// Stateless shake detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakePolicy {
    threshold: f64,
    decimals: u32,
}

impl Default for ShakePolicy {
    fn default() -> Self {
        Self::new(shake::THRESHOLD_G, shake::ROUNDING_DECIMALS)
    }
}

impl ShakePolicy {
    pub fn new(threshold: f64, decimals: u32) -> Self {
        Self {
            threshold,
            decimals,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Evaluate a single sample.
    ///
    /// Only positive x spikes fire; `x < -threshold` is ignored.
    pub fn evaluate(&self, sample: &MotionSample) -> CaptureTrigger {
        let x = round_to_decimals(sample.acceleration.x, self.decimals);
        (x > self.threshold).into()
    }
}

/// Round half away from zero at `decimals` places, on the decimal value.
///
/// `0.5005 * 1000.0` is `500.49999999999994` in binary, which would round
/// down. Scaling the magnitude by a few ULPs first moves such values back
/// onto the half they were written as.
pub fn round_to_decimals(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor * (1.0 + 4.0 * f64::EPSILON);
    scaled.round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::motion::Acceleration;

    fn sample_x(x: f64) -> MotionSample {
        MotionSample::new(Acceleration::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        assert_eq!(round_to_decimals(0.5005, 3), 0.501);
        assert_eq!(round_to_decimals(0.4996, 3), 0.5);
        assert_eq!(round_to_decimals(0.50049, 3), 0.5);
        assert_eq!(round_to_decimals(-0.5005, 3), -0.501);
        assert_eq!(round_to_decimals(1.0005, 3), 1.001);
    }

    #[test]
    fn test_rounding_passes_non_finite_values_through() {
        assert!(round_to_decimals(f64::NAN, 3).is_nan());
        assert_eq!(round_to_decimals(f64::INFINITY, 3), f64::INFINITY);
    }

    #[test]
    fn test_at_or_below_threshold_does_not_fire() {
        let policy = ShakePolicy::default();
        for x in [0.0, 0.1, 0.4996, 0.5, 0.5004] {
            assert_eq!(policy.evaluate(&sample_x(x)), CaptureTrigger::Ignore, "x = {x}");
        }
    }

    #[test]
    fn test_above_threshold_fires() {
        let policy = ShakePolicy::default();
        for x in [0.5005, 0.501, 0.6, 3.0] {
            assert_eq!(policy.evaluate(&sample_x(x)), CaptureTrigger::Capture, "x = {x}");
        }
    }

    #[test]
    fn test_negative_spikes_never_fire() {
        let policy = ShakePolicy::default();
        for x in [-0.6, -1.0, -8.0] {
            assert!(!policy.evaluate(&sample_x(x)).fires(), "x = {x}");
        }
    }

    #[test]
    fn test_only_x_axis_is_consulted() {
        let policy = ShakePolicy::default();
        let sample = MotionSample::new(Acceleration::new(0.2, 2.0, -2.0));
        assert_eq!(policy.evaluate(&sample), CaptureTrigger::Ignore);
    }

    #[test]
    fn test_same_sample_same_decision() {
        let policy = ShakePolicy::default();
        let sample = sample_x(0.75);
        assert_eq!(policy.evaluate(&sample), policy.evaluate(&sample));
    }

    #[test]
    fn test_stream_fires_once_on_third_sample() {
        let policy = ShakePolicy::default();
        let fired: Vec<usize> = [0.1, 0.3, 0.6, 0.2]
            .into_iter()
            .enumerate()
            .filter(|(_, x)| policy.evaluate(&sample_x(*x)).fires())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(fired, vec![2]);
    }

    #[test]
    fn test_consecutive_spikes_fire_independently() {
        let policy = ShakePolicy::default();
        let fired = [0.6, 0.7]
            .into_iter()
            .filter(|x| policy.evaluate(&sample_x(*x)).fires())
            .count();
        assert_eq!(fired, 2);
    }
}
