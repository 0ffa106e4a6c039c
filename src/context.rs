// SPDX-License-Identifier: GPL-3.0-only

//! Camera context
//!
//! Owns the capture session, the motion source and the image sink for the
//! lifetime of the app. Motion samples are evaluated by the [`ShakePolicy`]
//! as they arrive; each capture runs as its own task so evaluation never
//! waits on the camera. Results come back as [`CaptureEvent`]s and through
//! the [`CaptureStatus`] watch channel.
//!
//! All methods that start work must be called from within a Tokio runtime.

use crate::backends::camera::{
    CaptureRequestId, CaptureSession, CaptureSettings, V4l2CaptureSession, VirtualCaptureSession,
};
use crate::backends::motion::{
    IioAccelerometer, MotionSource, MotionStream, ScriptedMotionSource,
};
use crate::config::Config;
use crate::constants::channels;
use crate::errors::{AppResult, PhotoError};
use crate::orientation::{DeviceOrientation, OrientationObserver};
use crate::policy::ShakePolicy;
use crate::storage::{ImageSink, LibrarySink, ShareItems};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What asked for a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOrigin {
    Manual,
    Shake,
}

/// User-visible state of the capture pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureStatus {
    #[default]
    Idle,
    Capturing,
    Saved(PathBuf),
    Failed(String),
    /// Camera could not be set up; captures are unavailable
    Disabled(String),
}

impl CaptureStatus {
    pub fn is_disabled(&self) -> bool {
        matches!(self, CaptureStatus::Disabled(_))
    }
}

impl std::fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureStatus::Idle => write!(f, "Ready"),
            CaptureStatus::Capturing => write!(f, "Capturing..."),
            CaptureStatus::Saved(path) => write!(f, "Saved {}", path.display()),
            CaptureStatus::Failed(msg) => write!(f, "Failed: {}", msg),
            CaptureStatus::Disabled(msg) => write!(f, "Camera disabled: {}", msg),
        }
    }
}

/// Completion of one capture request
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEvent {
    pub id: CaptureRequestId,
    pub origin: CaptureOrigin,
    pub outcome: Result<PathBuf, PhotoError>,
}

/// Collaborators handed to the context
pub struct ContextParts {
    pub session: Arc<dyn CaptureSession>,
    /// None runs without shake capture
    pub motion: Option<Arc<dyn MotionSource>>,
    pub sink: Arc<dyn ImageSink>,
    /// Device orientation feed forwarded to the session
    pub orientation: Option<OrientationObserver>,
}

impl ContextParts {
    /// V4L2 camera from the config plus the first IIO accelerometer, if any
    pub fn hardware(config: &Config) -> Self {
        let motion: Option<Arc<dyn MotionSource>> = match IioAccelerometer::discover() {
            Ok(sensor) => Some(Arc::new(sensor)),
            Err(e) => {
                warn!(error = %e, "No accelerometer found");
                None
            }
        };

        Self {
            session: Arc::new(V4l2CaptureSession::with_default_format(
                config.camera_device.clone(),
            )),
            motion,
            sink: Arc::new(LibrarySink::new(config.photo_dir())),
            orientation: None,
        }
    }

    /// Virtual camera with an optional scripted motion source
    pub fn simulated(config: &Config, motion: Option<ScriptedMotionSource>) -> Self {
        let session = match &config.virtual_still {
            Some(path) => VirtualCaptureSession::from_image_file(path).unwrap_or_else(|e| {
                warn!(error = %e, "Still image unusable, using test pattern");
                VirtualCaptureSession::new()
            }),
            None => VirtualCaptureSession::new(),
        };

        Self {
            session: Arc::new(session),
            motion: motion.map(|m| Arc::new(m) as Arc<dyn MotionSource>),
            sink: Arc::new(LibrarySink::new(config.photo_dir())),
            orientation: None,
        }
    }

    /// Replace the motion source with a replayed script
    pub fn with_motion(mut self, script: ScriptedMotionSource) -> Self {
        self.motion = Some(Arc::new(script));
        self
    }

    pub fn with_orientation(mut self, observer: OrientationObserver) -> Self {
        self.orientation = Some(observer);
        self
    }
}

/// State shared with capture tasks
struct Shared {
    session: Arc<dyn CaptureSession>,
    sink: Arc<dyn ImageSink>,
    status: watch::Sender<CaptureStatus>,
    events: mpsc::Sender<CaptureEvent>,
    timeout: Duration,
    last_saved: Mutex<Option<PathBuf>>,
}

impl Shared {
    /// Ask the session for a photo and hand the wait to a task
    fn issue(self: &Arc<Self>, origin: CaptureOrigin, settings: CaptureSettings) -> CaptureRequestId {
        let id = CaptureRequestId::new();
        let pending = self.session.capture_photo(settings);
        info!(%id, ?origin, flash = settings.flash.display_name(), "Capture requested");

        self.status.send_if_modified(|status| {
            if status.is_disabled() {
                return false;
            }
            *status = CaptureStatus::Capturing;
            true
        });

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = match pending.wait(shared.timeout).await {
                Ok(image) => {
                    let sink = Arc::clone(&shared.sink);
                    tokio::task::spawn_blocking(move || sink.save_to_library(&image))
                        .await
                        .unwrap_or_else(|e| Err(PhotoError::SaveFailed(e.to_string())))
                }
                Err(e) => Err(e),
            };
            shared.finish(CaptureEvent {
                id,
                origin,
                outcome,
            });
        });

        id
    }

    fn finish(&self, event: CaptureEvent) {
        let status = match &event.outcome {
            Ok(path) => {
                info!(id = %event.id, path = %path.display(), "Capture saved");
                *self.last_saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(path.clone());
                CaptureStatus::Saved(path.clone())
            }
            Err(e) => {
                warn!(id = %event.id, error = %e, "Capture failed");
                CaptureStatus::Failed(e.to_string())
            }
        };

        self.status.send_if_modified(|current| {
            if current.is_disabled() {
                return false;
            }
            *current = status;
            true
        });

        if let Err(e) = self.events.try_send(event) {
            debug!(error = %e, "Capture event dropped");
        }
    }
}

/// Owned camera app state: session, shake detection and capture delivery
pub struct CameraContext {
    shared: Arc<Shared>,
    motion: Option<Arc<dyn MotionSource>>,
    orientation: Option<OrientationObserver>,
    events: Option<mpsc::Receiver<CaptureEvent>>,
    tasks: Vec<JoinHandle<()>>,
    policy: ShakePolicy,
    shake_enabled: bool,
    shake_settings: CaptureSettings,
    manual_settings: CaptureSettings,
    motion_interval: Duration,
    share_text: String,
    shake_active: bool,
    closed: bool,
}

impl CameraContext {
    /// Build an idle context. Nothing runs until [`start`](Self::start).
    pub fn new(parts: ContextParts, config: &Config) -> Self {
        let (status, _) = watch::channel(CaptureStatus::Idle);
        let (events_tx, events_rx) = mpsc::channel(channels::EVENT_BUFFER);

        Self {
            shared: Arc::new(Shared {
                session: parts.session,
                sink: parts.sink,
                status,
                events: events_tx,
                timeout: config.capture_timeout(),
                last_saved: Mutex::new(None),
            }),
            motion: parts.motion,
            orientation: parts.orientation,
            events: Some(events_rx),
            tasks: Vec::new(),
            policy: config.policy(),
            shake_enabled: config.shake_enabled,
            shake_settings: config.shake_capture,
            manual_settings: config.manual_capture,
            motion_interval: config.motion_interval(),
            share_text: config.share_text.clone(),
            shake_active: false,
            closed: false,
        }
    }

    /// Build and start in one step
    pub fn open(parts: ContextParts, config: &Config) -> AppResult<Self> {
        let mut context = Self::new(parts, config);
        context.start()?;
        Ok(context)
    }

    /// Start the camera session, then shake detection and orientation
    /// forwarding.
    ///
    /// A session failure disables capture: it is logged, the status becomes
    /// `Disabled` and the error is returned. A motion failure only leaves
    /// shake capture inactive.
    pub fn start(&mut self) -> AppResult<()> {
        if !self.tasks.is_empty() {
            return Ok(());
        }

        let session = Arc::clone(&self.shared.session);
        if let Err(e) = session.start_session() {
            error!(camera = session.name(), error = %e, "Camera session setup failed");
            self.shared
                .status
                .send_replace(CaptureStatus::Disabled(e.to_string()));
            return Err(e.into());
        }
        info!(camera = session.name(), "Camera session running");
        self.closed = false;
        self.shared.status.send_if_modified(|status| {
            let was_disabled = status.is_disabled();
            if was_disabled {
                *status = CaptureStatus::Idle;
            }
            was_disabled
        });

        if let Some(observer) = &self.orientation {
            let receiver = observer.subscribe();
            self.tasks
                .push(tokio::spawn(orientation_loop(receiver, Arc::clone(&session))));
        }

        if self.shake_enabled {
            self.start_shake();
        } else {
            info!("Shake capture disabled in config");
        }

        Ok(())
    }

    fn start_shake(&mut self) {
        let Some(motion) = &self.motion else {
            info!("No motion sensor, shake capture inactive");
            return;
        };

        match motion.start_updates(self.motion_interval) {
            Ok(stream) => {
                info!(
                    sensor = motion.name(),
                    interval_ms = self.motion_interval.as_millis() as u64,
                    threshold = self.policy.threshold(),
                    "Shake capture active"
                );
                self.tasks.push(tokio::spawn(motion_loop(
                    stream,
                    self.policy,
                    self.shake_settings,
                    Arc::clone(&self.shared),
                )));
                self.shake_active = true;
            }
            Err(e) => {
                warn!(sensor = motion.name(), error = %e, "Motion updates unavailable, shake capture inactive");
            }
        }
    }

    /// Take a photo now with the manual settings (or the shake settings for
    /// `CaptureOrigin::Shake`).
    pub fn capture(&self, origin: CaptureOrigin) -> CaptureRequestId {
        let settings = match origin {
            CaptureOrigin::Manual => self.manual_settings,
            CaptureOrigin::Shake => self.shake_settings,
        };
        self.shared.issue(origin, settings)
    }

    /// Receiver for capture completions. Can be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<CaptureEvent>> {
        self.events.take()
    }

    pub fn status(&self) -> watch::Receiver<CaptureStatus> {
        self.shared.status.subscribe()
    }

    pub fn last_photo(&self) -> Option<PathBuf> {
        self.shared
            .last_saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Share the most recently saved photo with the configured text
    pub fn share_last(&self) -> Result<PathBuf, PhotoError> {
        let image = self
            .last_photo()
            .ok_or_else(|| PhotoError::ShareFailed("no photo taken yet".to_string()))?;

        let items = ShareItems {
            text: self.share_text.clone(),
            image: image.clone(),
        };
        self.shared.sink.present_share_sheet(&items)?;
        Ok(image)
    }

    pub fn shake_active(&self) -> bool {
        self.shake_active && !self.closed
    }

    pub fn session(&self) -> &Arc<dyn CaptureSession> {
        &self.shared.session
    }

    /// Stop shake detection and orientation forwarding, then the session.
    ///
    /// Captures already in flight are not cancelled; their events are still
    /// delivered while the receiver lives.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(motion) = &self.motion {
            motion.stop_updates();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.shake_active = false;
        self.shared.session.stop_session();
        info!("Camera context closed");
    }
}

impl Drop for CameraContext {
    fn drop(&mut self) {
        self.close();
    }
}

async fn motion_loop(
    mut stream: MotionStream,
    policy: ShakePolicy,
    settings: CaptureSettings,
    shared: Arc<Shared>,
) {
    while let Some(reading) = stream.next().await {
        match reading {
            Ok(sample) => {
                if policy.evaluate(&sample).fires() {
                    debug!(x = sample.acceleration.x, "Shake detected");
                    shared.issue(CaptureOrigin::Shake, settings);
                }
            }
            Err(e) => debug!(error = %e, "Motion sample skipped"),
        }
    }
    debug!("Motion stream ended");
}

async fn orientation_loop(
    mut receiver: watch::Receiver<DeviceOrientation>,
    session: Arc<dyn CaptureSession>,
) {
    loop {
        let device = *receiver.borrow_and_update();
        match device.video_orientation() {
            Some(video) => {
                debug!(device = device.display_name(), degrees = video.rotation_degrees(), "Orientation forwarded");
                session.set_orientation(video);
            }
            None => debug!(device = device.display_name(), "Orientation unchanged"),
        }

        if receiver.changed().await.is_err() {
            break;
        }
    }
}
