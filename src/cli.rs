// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing cameras and motion sensors
//! - Taking a single photo
//! - Headless shake capture
//! - Replaying recorded motion through the shake policy

use shake_camera::backends::camera::v4l2;
use shake_camera::backends::motion::{IioAccelerometer, ScriptedMotionSource};
use shake_camera::{CameraContext, CaptureOrigin, Config, ContextParts};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::warn;

/// List V4L2 cameras and the accelerometer, if any
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = v4l2::list_devices();

    if devices.is_empty() {
        println!("No cameras found.");
    } else {
        println!("Available cameras:");
        println!();
        for device in &devices {
            println!("  {} {} ({})", device.path, device.card, device.driver);
        }
    }
    println!();

    match IioAccelerometer::discover() {
        Ok(sensor) => println!("Accelerometer: {}", sensor.path().display()),
        Err(e) => println!("Accelerometer: none ({})", e),
    }

    Ok(())
}

/// Take one photo and print where it was saved
pub fn take_photo(
    config: &Config,
    device: Option<String>,
    output: Option<PathBuf>,
    use_virtual: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config.clone();
    config.shake_enabled = false;
    if let Some(device) = device {
        config.camera_device = device;
    }
    if let Some(dir) = output {
        config.save_folder = Some(output_dir(&dir));
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(capture_once(&config, use_virtual))
}

async fn capture_once(config: &Config, use_virtual: bool) -> Result<(), Box<dyn std::error::Error>> {
    let parts = build_parts(config, use_virtual, None);
    let mut context = CameraContext::open(parts, config)?;
    let mut events = context.take_events().ok_or("capture events unavailable")?;

    println!("Using camera: {}", context.session().name());
    println!("Capturing...");
    context.capture(CaptureOrigin::Manual);

    let event = events.recv().await.ok_or("capture was dropped")?;
    context.close();

    let path = event.outcome?;
    println!("Photo saved: {}", path.display());
    Ok(())
}

/// Run shake capture without a UI until `duration` elapses or Ctrl+C
pub fn watch_shakes(
    config: &Config,
    duration: Option<u64>,
    use_virtual: bool,
    motion: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let script = motion
        .as_deref()
        .map(ScriptedMotionSource::from_json_file)
        .transpose()?;

    let (stop_tx, stop_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    })?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(watch_loop(
        config,
        use_virtual,
        script,
        duration.map(Duration::from_secs),
        stop_rx,
    ))
}

async fn watch_loop(
    config: &Config,
    use_virtual: bool,
    script: Option<ScriptedMotionSource>,
    deadline: Option<Duration>,
    mut stop_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let parts = build_parts(config, use_virtual, script);
    let mut context = CameraContext::open(parts, config)?;
    let mut events = context.take_events().ok_or("capture events unavailable")?;

    if !context.shake_active() {
        context.close();
        return Err("no motion source, nothing to watch".into());
    }

    println!(
        "Watching for shakes with {} (Ctrl+C to stop)",
        context.session().name()
    );

    let timer = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(timer);

    let mut saved = 0usize;
    let mut failed = 0usize;
    loop {
        tokio::select! {
            Some(event) = events.recv() => match event.outcome {
                Ok(path) => {
                    saved += 1;
                    println!("[{}] {:?} capture saved: {}", event.id, event.origin, path.display());
                }
                Err(e) => {
                    failed += 1;
                    println!("[{}] {:?} capture failed: {}", event.id, event.origin, e);
                }
            },
            _ = &mut timer => break,
            _ = stop_rx.changed() => break,
        }
    }

    context.close();
    println!("Stopped: {} saved, {} failed", saved, failed);
    Ok(())
}

/// Print the policy decision for every sample in a motion recording
pub fn replay(config: &Config, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let script = ScriptedMotionSource::from_json_file(file)?;
    let policy = config.policy();

    let mut captures = 0usize;
    for (index, reading) in script
        .readings(config.motion_interval())
        .into_iter()
        .enumerate()
    {
        match reading {
            Ok(sample) => {
                let trigger = policy.evaluate(&sample);
                if trigger.fires() {
                    captures += 1;
                }
                println!(
                    "{:>4}  t={:>7.3}s  x={:>8.4}  {:?}",
                    index,
                    sample.timestamp.as_secs_f64(),
                    sample.acceleration.x,
                    trigger
                );
            }
            Err(e) => println!("{:>4}  skipped: {}", index, e),
        }
    }

    println!();
    println!(
        "{} samples, {} captures (threshold {} g)",
        script.len(),
        captures,
        policy.threshold()
    );
    Ok(())
}

fn build_parts(
    config: &Config,
    use_virtual: bool,
    script: Option<ScriptedMotionSource>,
) -> ContextParts {
    if use_virtual {
        return ContextParts::simulated(config, script);
    }

    match script {
        Some(script) => ContextParts::hardware(config).with_motion(script),
        None => ContextParts::hardware(config),
    }
}

/// Directory for `--output`: the path itself, or the parent of a file path
fn output_dir(path: &Path) -> PathBuf {
    if path.is_dir() || path.extension().is_none() {
        return path.to_path_buf();
    }
    warn!(path = %path.display(), "Output is a file path, saving into its directory");
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
