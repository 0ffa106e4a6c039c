// SPDX-License-Identifier: GPL-3.0-only

//! Linux IIO accelerometer
//!
//! Reads `in_accel_{x,y,z}_raw` from `/sys/bus/iio/devices/iio:deviceN`.
//!
//! processed_value = (raw + offset) * scale, in m/s². Values are converted
//! to g, rotated by the mount matrix, and gravity is removed with a low-pass
//! estimate so the stream carries user acceleration.

use super::{Acceleration, MotionSample, MotionSource, MotionStream, StopSignal};
use crate::constants::motion::{GRAVITY_FILTER_ALPHA, STANDARD_GRAVITY};
use crate::errors::MotionError;
use futures::StreamExt;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const IIO_DEVICES_DIR: &str = "/sys/bus/iio/devices";

/// Sensor orientation inside the device
///
/// Parsed from the kernel's `in_accel_mount_matrix`, e.g.
/// "1, 0, 0; 0, 1, 0; 0, 0, 1"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MountMatrix {
    pub x: (f64, f64, f64),
    pub y: (f64, f64, f64),
    pub z: (f64, f64, f64),
}

impl Default for MountMatrix {
    fn default() -> Self {
        MountMatrix {
            x: (1.0, 0.0, 0.0),
            y: (0.0, 1.0, 0.0),
            z: (0.0, 0.0, 1.0),
        }
    }
}

impl MountMatrix {
    pub fn parse(matrix: &str) -> Result<Self, MotionError> {
        let rows: Vec<&str> = matrix.split(';').map(str::trim).collect();
        if rows.len() != 3 {
            return Err(MotionError::ReadFailed(format!(
                "mount matrix needs 3 rows, got {}",
                rows.len()
            )));
        }

        let mut parsed = [(0.0, 0.0, 0.0); 3];
        for (row, out) in rows.iter().zip(parsed.iter_mut()) {
            let values = row
                .split(',')
                .map(|v| v.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| MotionError::ReadFailed(format!("mount matrix: {}", e)))?;
            let &[a, b, c] = values.as_slice() else {
                return Err(MotionError::ReadFailed(format!(
                    "mount matrix row needs 3 values: {:?}",
                    row
                )));
            };
            *out = (a, b, c);
        }

        Ok(MountMatrix {
            x: parsed[0],
            y: parsed[1],
            z: parsed[2],
        })
    }

    // x' = mxx * x + myx * y + mzx * z, and likewise for y' and z'
    pub fn rotate(&self, v: Acceleration) -> Acceleration {
        Acceleration {
            x: self.x.0 * v.x + self.y.0 * v.y + self.z.0 * v.z,
            y: self.x.1 * v.x + self.y.1 * v.y + self.z.1 * v.z,
            z: self.x.2 * v.x + self.y.2 * v.y + self.z.2 * v.z,
        }
    }
}

impl fmt::Display for MountMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}; {}, {}, {}; {}, {}, {}",
            self.x.0, self.x.1, self.x.2, self.y.0, self.y.1, self.y.2, self.z.0, self.z.1, self.z.2,
        )
    }
}

/// Scale and offset for one axis
#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisInfo {
    offset: f64,
    scale: f64,
}

/// Splits total acceleration into gravity and user acceleration
#[derive(Debug, Clone, Default)]
pub struct GravityFilter {
    gravity: Option<Acceleration>,
}

impl GravityFilter {
    /// Feed a total acceleration (g) and get user acceleration back.
    ///
    /// The first reading seeds the gravity estimate and yields zero.
    pub fn user_acceleration(&mut self, total: Acceleration) -> Acceleration {
        let a = GRAVITY_FILTER_ALPHA;
        let gravity = match self.gravity {
            None => total,
            Some(g) => Acceleration {
                x: a * g.x + (1.0 - a) * total.x,
                y: a * g.y + (1.0 - a) * total.y,
                z: a * g.z + (1.0 - a) * total.z,
            },
        };
        self.gravity = Some(gravity);

        Acceleration {
            x: total.x - gravity.x,
            y: total.y - gravity.y,
            z: total.z - gravity.z,
        }
    }
}

/// Accelerometer exposed by the Linux IIO subsystem
#[derive(Debug)]
pub struct IioAccelerometer {
    name: String,
    path: PathBuf,
    mount_matrix: MountMatrix,
    axes: [AxisInfo; 3],
    stop: StopSignal,
}

impl IioAccelerometer {
    /// Find the first IIO device with an accelerometer x channel
    pub fn discover() -> Result<Self, MotionError> {
        Self::discover_in(Path::new(IIO_DEVICES_DIR))
    }

    pub fn discover_in(devices_dir: &Path) -> Result<Self, MotionError> {
        let entries = std::fs::read_dir(devices_dir).map_err(|e| {
            MotionError::SensorUnavailable(format!("{}: {}", devices_dir.display(), e))
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.join("in_accel_x_raw").exists())
            .collect();
        candidates.sort();

        let Some(path) = candidates.into_iter().next() else {
            return Err(MotionError::SensorUnavailable(format!(
                "no accelerometer below {}",
                devices_dir.display()
            )));
        };

        Self::open(&path)
    }

    /// Open a specific IIO device directory
    pub fn open(path: &Path) -> Result<Self, MotionError> {
        let name = read_trimmed(&path.join("name")).unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "iio".to_string())
        });

        let mount_matrix = match read_trimmed(&path.join("in_accel_mount_matrix"))
            .or_else(|| read_trimmed(&path.join("mount_matrix")))
        {
            Some(matrix) => MountMatrix::parse(&matrix)?,
            None => MountMatrix::default(),
        };

        let axes = [
            axis_info(path, 'x')?,
            axis_info(path, 'y')?,
            axis_info(path, 'z')?,
        ];

        info!(
            name = %name,
            path = %path.display(),
            mount_matrix = %mount_matrix,
            "Found IIO accelerometer"
        );

        Ok(Self {
            name,
            path: path.to_path_buf(),
            mount_matrix,
            axes,
            stop: StopSignal::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MotionSource for IioAccelerometer {
    fn name(&self) -> &str {
        &self.name
    }

    fn start_updates(&self, interval: Duration) -> Result<MotionStream, MotionError> {
        let path = self.path.clone();
        let axes = self.axes;
        let mount_matrix = self.mount_matrix;
        let mut stop = self.stop.arm();
        debug!(path = %path.display(), ?interval, "Starting IIO motion updates");

        let stream = async_stream::stream! {
            let mut ticker = super::sample_ticker(interval);
            let mut filter = GravityFilter::default();
            let started = Instant::now();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.changed() => break,
                }
                let reading = read_total(&path, &axes).await.map(|total| {
                    let user = filter.user_acceleration(mount_matrix.rotate(total));
                    MotionSample::at(started.elapsed(), user)
                });
                yield reading;
            }
        };

        Ok(stream.boxed())
    }

    fn stop_updates(&self) {
        self.stop.fire();
    }
}

/// Read all three axes and convert to g
async fn read_total(path: &Path, axes: &[AxisInfo; 3]) -> Result<Acceleration, MotionError> {
    let mut values = [0.0; 3];
    for ((axis, info), value) in ['x', 'y', 'z'].iter().zip(axes).zip(values.iter_mut()) {
        let file = path.join(format!("in_accel_{}_raw", axis));
        let raw = tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| MotionError::ReadFailed(format!("{}: {}", file.display(), e)))?;
        let raw: f64 = raw
            .trim()
            .parse()
            .map_err(|e| MotionError::ReadFailed(format!("{}: {}", file.display(), e)))?;
        *value = (raw + info.offset) * info.scale / STANDARD_GRAVITY;
    }
    Ok(Acceleration::new(values[0], values[1], values[2]))
}

/// Scale/offset for an axis, falling back to the shared `in_accel_*` files
fn axis_info(path: &Path, axis: char) -> Result<AxisInfo, MotionError> {
    let read_f64 = |name: String| -> Option<f64> {
        let value = read_trimmed(&path.join(&name))?;
        match value.parse::<f64>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(file = %name, error = %e, "Ignoring unparsable IIO attribute");
                None
            }
        }
    };

    let scale = read_f64(format!("in_accel_{}_scale", axis))
        .or_else(|| read_f64("in_accel_scale".to_string()))
        .ok_or_else(|| {
            MotionError::SensorUnavailable(format!("{}: no accelerometer scale", path.display()))
        })?;
    let offset = read_f64(format!("in_accel_{}_offset", axis))
        .or_else(|| read_f64("in_accel_offset".to_string()))
        .unwrap_or(0.0);

    Ok(AxisInfo { offset, scale })
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_device(raw: (i32, i32, i32)) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("shake-camera-iio-{}", uuid::Uuid::new_v4()))
            .join("iio:device0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("name"), "test-accel\n").unwrap();
        // 1 raw unit = 1 g
        std::fs::write(dir.join("in_accel_scale"), format!("{}\n", STANDARD_GRAVITY)).unwrap();
        std::fs::write(dir.join("in_accel_x_raw"), format!("{}\n", raw.0)).unwrap();
        std::fs::write(dir.join("in_accel_y_raw"), format!("{}\n", raw.1)).unwrap();
        std::fs::write(dir.join("in_accel_z_raw"), format!("{}\n", raw.2)).unwrap();
        dir
    }

    #[test]
    fn test_mount_matrix_parse() {
        let m = MountMatrix::parse("0, 1, 0; -1, 0, 0; 0, 0, 1").unwrap();
        assert_eq!(m.x, (0.0, 1.0, 0.0));
        assert_eq!(m.y, (-1.0, 0.0, 0.0));

        let rotated = m.rotate(Acceleration::new(1.0, 0.0, 0.0));
        assert_eq!(rotated, Acceleration::new(0.0, 1.0, 0.0));

        assert!(MountMatrix::parse("1, 0; 0, 1").is_err());
        assert!(MountMatrix::parse("1, 0, 0; 0, 1; 0, 0, 1").is_err());
    }

    fn near_zero(v: Acceleration) -> bool {
        v.x.abs() < 1e-9 && v.y.abs() < 1e-9 && v.z.abs() < 1e-9
    }

    #[test]
    fn test_gravity_filter_removes_constant_component() {
        let mut filter = GravityFilter::default();
        let resting = Acceleration::new(0.0, 0.0, -1.0);

        assert!(near_zero(filter.user_acceleration(resting)));
        assert!(near_zero(filter.user_acceleration(resting)));

        let jolt = filter.user_acceleration(Acceleration::new(1.0, 0.0, -1.0));
        assert!(jolt.x > 0.5, "jolt.x = {}", jolt.x);
        assert!(jolt.z.abs() < 1e-9);
    }

    #[test]
    fn test_discover_finds_device() {
        let dir = fake_device((0, 0, -1));
        let parent = dir.parent().unwrap();
        let accel = IioAccelerometer::discover_in(parent).unwrap();
        assert_eq!(accel.name(), "test-accel");
        assert_eq!(accel.path(), dir.as_path());
    }

    #[test]
    fn test_discover_without_device_is_unavailable() {
        let empty = std::env::temp_dir().join(format!("shake-camera-iio-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&empty).unwrap();
        let err = IioAccelerometer::discover_in(&empty).unwrap_err();
        assert!(matches!(err, MotionError::SensorUnavailable(_)));
    }

    #[tokio::test]
    async fn test_read_total_converts_to_g() {
        let dir = fake_device((2, 0, -1));
        let accel = IioAccelerometer::open(&dir).unwrap();
        let total = read_total(&dir, &accel.axes).await.unwrap();
        assert!((total.x - 2.0).abs() < 1e-9);
        assert!((total.z + 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_axis_is_read_error() {
        let dir = fake_device((0, 0, 0));
        let accel = IioAccelerometer::open(&dir).unwrap();
        std::fs::remove_file(dir.join("in_accel_y_raw")).unwrap();

        let mut stream = accel.start_updates(Duration::from_millis(1)).unwrap();
        let reading = stream.next().await.unwrap();
        assert!(matches!(reading, Err(MotionError::ReadFailed(_))));
        accel.stop_updates();
    }
}
