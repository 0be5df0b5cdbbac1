//! Session anchor clock.
//!
//! Every producer in a recording session converts wall-clock reads into
//! relative time through one [`SessionAnchor`]. The anchor is written
//! exactly once; producers that start earlier block on it and discard
//! whatever they read in the meantime.
//!
//! Two read-outs come from the same anchor:
//! - *active* time (`now - anchor`), where pausing shifts the anchor
//!   forward so paused spans never count. Used for audio drift accounting
//!   and video frame pacing.
//! - *recording-timeline* time (`now - origin`), where the origin never
//!   moves. Used to timestamp event log entries, including pause markers,
//!   so that pause intervals can be reconstructed offline.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct AnchorState {
    origin: Option<Instant>,
    anchor: Option<Instant>,
    pause_started: Option<Instant>,
    total_paused: Duration,
    origin_wall: Option<String>,
}

/// Write-once session start timestamp with pause shifting.
#[derive(Debug, Default)]
pub struct SessionAnchor {
    state: Mutex<AnchorState>,
    ready: Condvar,
}

impl SessionAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the anchor. Returns false if it was already set.
    pub fn set(&self, at: Instant) -> bool {
        let mut state = self.state.lock();
        if state.origin.is_some() {
            return false;
        }
        state.origin = Some(at);
        state.anchor = Some(at);
        state.origin_wall = Some(chrono::Utc::now().to_rfc3339());
        drop(state);
        self.ready.notify_all();
        true
    }

    /// Set the anchor to the current instant.
    pub fn set_now(&self) -> bool {
        self.set(Instant::now())
    }

    pub fn is_set(&self) -> bool {
        self.state.lock().origin.is_some()
    }

    /// Block until the anchor is set or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.origin.is_none() {
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return state.origin.is_some();
            }
        }
        true
    }

    /// Wall-clock label for the moment the anchor was set (RFC 3339).
    pub fn origin_wall(&self) -> Option<String> {
        self.state.lock().origin_wall.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().pause_started.is_some()
    }

    pub fn pause(&self) -> bool {
        self.pause_at(Instant::now())
    }

    /// Mark the session paused at `at`. Returns false if the anchor is not
    /// set yet or the session is already paused.
    pub fn pause_at(&self, at: Instant) -> bool {
        let mut state = self.state.lock();
        if state.anchor.is_none() || state.pause_started.is_some() {
            return false;
        }
        state.pause_started = Some(at);
        true
    }

    pub fn resume(&self) -> Option<Duration> {
        self.resume_at(Instant::now())
    }

    /// Leave the paused state at `at`, shifting the anchor forward by the
    /// pause duration. Returns that duration.
    pub fn resume_at(&self, at: Instant) -> Option<Duration> {
        let mut state = self.state.lock();
        let started = state.pause_started.take()?;
        let paused = at.saturating_duration_since(started);
        state.anchor = state.anchor.map(|anchor| anchor + paused);
        state.total_paused += paused;
        Some(paused)
    }

    /// Total time spent paused across completed pauses.
    pub fn total_paused(&self) -> Duration {
        self.state.lock().total_paused
    }

    pub fn elapsed_active(&self) -> Option<Duration> {
        self.elapsed_active_at(Instant::now())
    }

    /// Active time at `now`. While paused the value is frozen at the
    /// instant the pause began.
    pub fn elapsed_active_at(&self, now: Instant) -> Option<Duration> {
        let state = self.state.lock();
        let anchor = state.anchor?;
        let reference = state.pause_started.unwrap_or(now);
        Some(reference.saturating_duration_since(anchor))
    }

    pub fn elapsed_active_secs(&self) -> Option<f64> {
        self.elapsed_active().map(|d| d.as_secs_f64())
    }

    pub fn since_origin(&self) -> Option<f64> {
        self.since_origin_at(Instant::now())
    }

    /// Seconds on the recording timeline (origin never shifts).
    pub fn since_origin_at(&self, now: Instant) -> Option<f64> {
        let origin = self.state.lock().origin?;
        Some(now.saturating_duration_since(origin).as_secs_f64())
    }
}

/// Drift measurement between two streams.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Position of the reference stream (seconds of active time).
    pub reference_secs: f64,
    /// Position of the measured stream (seconds of media written).
    pub measured_secs: f64,
}

impl DriftMeasurement {
    /// Drift in milliseconds (positive = measured is ahead).
    pub fn drift_ms(&self) -> f64 {
        (self.measured_secs - self.reference_secs) * 1000.0
    }

    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_is_write_once() {
        let anchor = SessionAnchor::new();
        let t0 = Instant::now();
        assert!(anchor.set(t0));
        assert!(!anchor.set(t0 + Duration::from_secs(1)));
        assert_eq!(anchor.since_origin_at(t0 + Duration::from_secs(2)), Some(2.0));
    }

    #[test]
    fn test_unset_anchor_reads_none() {
        let anchor = SessionAnchor::new();
        assert!(anchor.elapsed_active().is_none());
        assert!(anchor.since_origin().is_none());
        assert!(!anchor.pause());
        assert!(anchor.resume().is_none());
    }

    #[test]
    fn test_pause_shifts_active_time_only() {
        let anchor = SessionAnchor::new();
        let t0 = Instant::now();
        anchor.set(t0);

        assert!(anchor.pause_at(t0 + Duration::from_secs(2)));
        // Frozen while paused.
        assert_eq!(
            anchor.elapsed_active_at(t0 + Duration::from_secs(3)),
            Some(Duration::from_secs(2))
        );
        let paused = anchor.resume_at(t0 + Duration::from_secs(4));
        assert_eq!(paused, Some(Duration::from_secs(2)));

        let now = t0 + Duration::from_secs(10);
        assert_eq!(anchor.elapsed_active_at(now), Some(Duration::from_secs(8)));
        assert_eq!(anchor.since_origin_at(now), Some(10.0));
        assert_eq!(anchor.total_paused(), Duration::from_secs(2));
    }

    #[test]
    fn test_active_time_matches_wall_clock() {
        let anchor = SessionAnchor::new();
        let start = Instant::now();
        anchor.set(start);
        std::thread::sleep(Duration::from_millis(30));
        anchor.pause();
        std::thread::sleep(Duration::from_millis(40));
        anchor.resume();
        std::thread::sleep(Duration::from_millis(30));

        let wall_active = start.elapsed().as_secs_f64() - anchor.total_paused().as_secs_f64();
        let active = anchor.elapsed_active_secs().unwrap();
        assert!((wall_active - active).abs() < 0.010, "{wall_active} vs {active}");
    }

    #[test]
    fn test_wait_wakes_on_set() {
        let anchor = Arc::new(SessionAnchor::new());
        let waiter = {
            let anchor = Arc::clone(&anchor);
            std::thread::spawn(move || anchor.wait(Duration::from_secs(5)))
        };
        std::thread::sleep(Duration::from_millis(20));
        anchor.set_now();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_wait_times_out() {
        let anchor = SessionAnchor::new();
        assert!(!anchor.wait(Duration::from_millis(10)));
    }

    #[test]
    fn test_drift_measurement() {
        let drift = DriftMeasurement {
            reference_secs: 1.0,
            measured_secs: 1.05,
        };
        assert!((drift.drift_ms() - 50.0).abs() < 1e-6);
        assert!(drift.exceeds_threshold_ms(10.0));
        assert!(!drift.exceeds_threshold_ms(100.0));
    }
}
