// SPDX-License-Identifier: MPL-2.0

//! Shake Camera - take a photo by shaking the device
//!
//! Previews a live camera feed and captures a photo either on request or
//! when the accelerometer reports a sharp sideways shake. Captured photos go
//! to the user's picture library and can be shared from there.
//!
//! # Architecture
//!
//! - [`policy`]: the per-sample shake decision
//! - [`context`]: owns the session, motion source and sink; delivers results
//! - [`backends`]: capture sessions (V4L2, virtual) and motion sources (IIO, scripted)
//! - [`orientation`]: device to video orientation mapping
//! - [`storage`]: saving and sharing photos
//! - [`config`]: user configuration handling
//! - [`terminal`]: terminal preview host
//!
//! # Example
//!
//! ```no_run
//! use shake_camera::backends::motion::{Acceleration, MotionSample};
//! use shake_camera::policy::ShakePolicy;
//!
//! let policy = ShakePolicy::default();
//! let sample = MotionSample::new(Acceleration::new(0.6, 0.0, 0.0));
//! assert!(policy.evaluate(&sample).fires());
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod flash;
pub mod orientation;
pub mod policy;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use context::{CameraContext, CaptureEvent, CaptureOrigin, CaptureStatus, ContextParts};
pub use errors::{AppError, AppResult};
pub use policy::{CaptureTrigger, ShakePolicy};
