// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera and motion sensing
//!
//! This module provides the platform services the app consumes:
//! - Photo capture sessions (V4L2 hardware or a virtual camera)
//! - Accelerometer readings (Linux IIO or a scripted replay)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               CameraContext                 │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌──────────────────┐  ┌────────────────┐   │
//! │  │      Camera      │  │     Motion     │   │
//! │  │ (V4L2 / Virtual) │  │(IIO / Scripted)│   │
//! │  └──────────────────┘  └────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Capture session trait and implementations
//! - [`motion`]: Motion source trait and implementations

pub mod camera;
pub mod motion;
