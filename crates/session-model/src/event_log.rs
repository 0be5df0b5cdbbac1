//! Thread-safe, append-only event log.

use parking_lot::Mutex;
use std::path::Path;

use zoomcast_common::ZoomcastResult;

use crate::event::{save_events, sort_by_time, TimestampedEvent};

/// Append-only record of pointer and pause events for one session.
///
/// Producers append under a single mutex. Entries are appended in time
/// order by construction, but every read-out re-sorts its copy before
/// handing it over.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<TimestampedEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: TimestampedEvent) {
        self.events.lock().push(event);
    }

    pub fn record_move(&self, time: f64, x: f64, y: f64) {
        self.append(TimestampedEvent::pointer_move(time, x, y));
    }

    pub fn record_click(&self, time: f64, x: f64, y: f64, button: impl Into<String>) {
        self.append(TimestampedEvent::click(time, x, y, button));
    }

    pub fn record_pause_start(&self, time: f64) {
        self.append(TimestampedEvent::pause_start(time));
    }

    pub fn record_pause_end(&self, time: f64) {
        self.append(TimestampedEvent::pause_end(time));
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Time-sorted copy of the log; the log itself is unchanged.
    pub fn snapshot(&self) -> Vec<TimestampedEvent> {
        let mut events = self.events.lock().clone();
        sort_by_time(&mut events);
        events
    }

    /// Take every event out of the log, sorted by time.
    pub fn drain(&self) -> Vec<TimestampedEvent> {
        let mut events = std::mem::take(&mut *self.events.lock());
        sort_by_time(&mut events);
        events
    }

    /// Events appended after the first `seen`, in append order.
    ///
    /// Lets a live consumer follow the log incrementally without copying
    /// it on every frame.
    pub fn events_since(&self, seen: usize) -> Vec<TimestampedEvent> {
        let events = self.events.lock();
        events.get(seen..).map(<[_]>::to_vec).unwrap_or_default()
    }

    /// Write a sorted snapshot to `path` as a JSON array.
    pub fn save(&self, path: &Path) -> ZoomcastResult<usize> {
        let events = self.snapshot();
        save_events(path, &events)?;
        tracing::info!(path = %path.display(), events = events.len(), "Event log saved");
        Ok(events.len())
    }
}
