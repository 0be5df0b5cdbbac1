//! zoomcast input tracker
//!
//! Follows the pointer during a recording session and appends move and
//! click events to the shared [`EventLog`]. Uses a pluggable backend:
//!
//! - **Evdev:** `/dev/input/mice` (Linux, requires `input` group access)
//! - **Scripted:** pre-loaded samples for tests and dry runs
//!
//! Nothing is logged before the session anchor exists or while paused.
//! Coordinates are logged relative to the capture region.

pub mod backends;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use zoomcast_common::{SessionAnchor, ZoomcastResult};
use zoomcast_session_model::{CaptureRegion, EventLog};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1);
const ANCHOR_WAIT_SLICE: Duration = Duration::from_millis(20);

/// Pointer button names as written to the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

impl PointerButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "middle",
        }
    }
}

/// One pointer observation in desktop pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerSample {
    Move { x: f64, y: f64 },
    Click { x: f64, y: f64, button: PointerButton },
}

/// Trait for input tracking backends.
pub trait InputBackend: Send {
    /// Poll for the next pointer sample. Returns `None` if none is pending.
    fn poll(&mut self) -> ZoomcastResult<Option<PointerSample>>;

    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Check if the backend is available on this system.
    fn is_available(&self) -> bool;

    /// Current pointer position, if the backend tracks one.
    fn position(&self) -> Option<(f64, f64)> {
        None
    }
}

/// Couples a backend with the session's event log and anchor.
pub struct InputTracker {
    backend: Box<dyn InputBackend>,
    log: Arc<EventLog>,
    anchor: Arc<SessionAnchor>,
    region: CaptureRegion,
    stop_flag: Arc<AtomicBool>,
    events_logged: u64,
    discarded: u64,
}

impl InputTracker {
    pub fn new(
        backend: Box<dyn InputBackend>,
        log: Arc<EventLog>,
        anchor: Arc<SessionAnchor>,
        region: CaptureRegion,
    ) -> Self {
        Self {
            backend,
            log,
            anchor,
            region,
            stop_flag: Arc::new(AtomicBool::new(false)),
            events_logged: 0,
            discarded: 0,
        }
    }

    /// Run the tracking loop until the stop flag is set.
    pub async fn run(&mut self) -> ZoomcastResult<u64> {
        tracing::info!(backend = %self.backend.name(), "Input tracker started");

        if self.wait_for_anchor().await {
            self.log_initial_position();
            while !self.stop_flag.load(Ordering::Relaxed) {
                match self.backend.poll() {
                    Ok(Some(sample)) => self.record(sample),
                    Ok(None) => tokio::time::sleep(IDLE_POLL_INTERVAL).await,
                    Err(e) => {
                        tracing::warn!(error = %e, "Input tracking error");
                        tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                    }
                }
            }
        }

        tracing::info!(
            events = self.events_logged,
            discarded = self.discarded,
            "Input tracker stopped"
        );
        Ok(self.events_logged)
    }

    /// Block on the anchor in slices, dropping samples that arrive before
    /// it is set. Returns false if stopped first.
    async fn wait_for_anchor(&mut self) -> bool {
        while !self.anchor.is_set() {
            if self.stop_flag.load(Ordering::Relaxed) {
                return false;
            }
            let anchor = self.anchor.clone();
            let waited =
                tokio::task::spawn_blocking(move || anchor.wait(ANCHOR_WAIT_SLICE)).await;
            if let Err(e) = waited {
                tracing::warn!(error = %e, "Anchor wait task failed");
            }
            // Anything queued during the wait predates the anchor.
            self.discard_pending();
        }
        true
    }

    fn discard_pending(&mut self) {
        while let Ok(Some(_)) = self.backend.poll() {
            self.discarded += 1;
        }
    }

    /// Log where the pointer is at the first anchored instant.
    fn log_initial_position(&mut self) {
        let Some(time) = self.anchor.since_origin() else {
            return;
        };
        if let Some((x, y)) = self.backend.position() {
            let (x, y) = self.region.to_local(x, y);
            self.log.record_move(time, x, y);
            self.events_logged += 1;
        }
    }

    fn record(&mut self, sample: PointerSample) {
        if self.anchor.is_paused() {
            self.discarded += 1;
            return;
        }
        let Some(time) = self.anchor.since_origin() else {
            self.discarded += 1;
            return;
        };

        match sample {
            PointerSample::Move { x, y } => {
                let (x, y) = self.region.to_local(x, y);
                self.log.record_move(time, x, y);
            }
            PointerSample::Click { x, y, button } => {
                let (x, y) = self.region.to_local(x, y);
                tracing::debug!(time, x, y, button = button.as_str(), "Click");
                self.log.record_click(time, x, y, button.as_str());
            }
        }
        self.events_logged += 1;
    }

    /// Set the stop flag.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Get the stop flag for external coordination.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Number of events logged so far.
    pub fn events_logged(&self) -> u64 {
        self.events_logged
    }
}
