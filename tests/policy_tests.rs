// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the shake capture policy

use shake_camera::backends::motion::{Acceleration, MotionSample, ScriptedMotionSource};
use shake_camera::{CaptureTrigger, ShakePolicy};
use std::time::Duration;

fn decide(x: f64) -> CaptureTrigger {
    ShakePolicy::default().evaluate(&MotionSample::new(Acceleration::new(x, 0.0, 0.0)))
}

#[test]
fn test_threshold_boundaries() {
    assert_eq!(decide(0.5), CaptureTrigger::Ignore);
    assert_eq!(decide(0.4996), CaptureTrigger::Ignore);
    assert_eq!(decide(0.5004), CaptureTrigger::Ignore);
    assert_eq!(decide(0.5005), CaptureTrigger::Capture);
    assert_eq!(decide(0.501), CaptureTrigger::Capture);
}

#[test]
fn test_negative_shakes_never_fire() {
    for x in [-0.6, -1.0, -5.0] {
        assert_eq!(decide(x), CaptureTrigger::Ignore, "x = {x}");
    }
}

#[test]
fn test_only_x_axis_counts() {
    let sample = MotionSample::new(Acceleration::new(0.1, 3.0, -3.0));
    assert!(!ShakePolicy::default().evaluate(&sample).fires());
}

#[test]
fn test_decision_is_memoryless() {
    let policy = ShakePolicy::default();
    let sample = MotionSample::new(Acceleration::new(0.6, 0.0, 0.0));
    assert_eq!(policy.evaluate(&sample), policy.evaluate(&sample));
}

#[test]
fn test_recorded_stream_decisions() {
    let policy = ShakePolicy::default();
    let script = ScriptedMotionSource::from_x_values(&[0.1, 0.3, 0.6, 0.2]);

    let fired: Vec<usize> = script
        .readings(Duration::from_millis(100))
        .into_iter()
        .enumerate()
        .filter(|(_, r)| r.as_ref().map(|s| policy.evaluate(s).fires()).unwrap_or(false))
        .map(|(i, _)| i)
        .collect();

    assert_eq!(fired, vec![2]);
}

#[test]
fn test_recorded_json_with_errors() {
    let policy = ShakePolicy::default();
    let script =
        ScriptedMotionSource::from_json_str(r#"[0.7, {"error": "i2c timeout"}, {"x": 0.6, "z": 1.0}]"#)
            .unwrap();

    let readings = script.readings(Duration::from_millis(100));
    assert_eq!(readings.len(), 3);
    assert!(readings[1].is_err());

    let captures = readings
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .filter(|s| policy.evaluate(s).fires())
        .count();
    assert_eq!(captures, 2);
}
