//! Timestamped event types.
//!
//! On disk an event log is a single JSON array, one object per event:
//! `{"time": 1.25, "type": "click", "x": 400, "y": 300, "button": "left"}`.
//! `time` is seconds on the recording timeline (relative to the session
//! anchor origin); `x`/`y` are device-space pixels relative to the capture
//! region.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use zoomcast_common::{ZoomcastError, ZoomcastResult};

use crate::pause::{derive_pause_intervals, PauseInterval};

/// A single recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedEvent {
    /// Seconds since the session anchor origin.
    pub time: f64,

    #[serde(flatten)]
    pub kind: EventKind,
}

/// Discriminated union of event types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Pointer position update.
    Move { x: f64, y: f64 },

    /// Button press.
    Click {
        x: f64,
        y: f64,
        #[serde(default)]
        button: String,
    },

    PauseStart,
    PauseEnd,
}

impl TimestampedEvent {
    pub fn pointer_move(time: f64, x: f64, y: f64) -> Self {
        Self {
            time,
            kind: EventKind::Move { x, y },
        }
    }

    pub fn click(time: f64, x: f64, y: f64, button: impl Into<String>) -> Self {
        Self {
            time,
            kind: EventKind::Click {
                x,
                y,
                button: button.into(),
            },
        }
    }

    pub fn pause_start(time: f64) -> Self {
        Self {
            time,
            kind: EventKind::PauseStart,
        }
    }

    pub fn pause_end(time: f64) -> Self {
        Self {
            time,
            kind: EventKind::PauseEnd,
        }
    }

    /// Pointer position if this event carries one.
    pub fn position(&self) -> Option<(f64, f64)> {
        match &self.kind {
            EventKind::Move { x, y } | EventKind::Click { x, y, .. } => Some((*x, *y)),
            EventKind::PauseStart | EventKind::PauseEnd => None,
        }
    }
}

/// Sort events by time, keeping insertion order for equal timestamps.
pub fn sort_by_time(events: &mut [TimestampedEvent]) {
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
}

/// Parse an event log from its JSON array form.
///
/// Entries are converted one at a time; an entry that cannot be read is
/// skipped with a warning instead of failing the whole log. Only a file that
/// is not a JSON array is an error.
pub fn parse_events(json: &str) -> Result<Vec<TimestampedEvent>, serde_json::Error> {
    let entries: Vec<Value> = serde_json::from_str(json)?;
    let (events, skipped) = events_from_entries(entries);
    if skipped > 0 {
        tracing::warn!(
            skipped,
            kept = events.len(),
            "Skipped unreadable event log entries"
        );
    }
    Ok(events)
}

/// Convert raw log entries, returning the readable events and the number
/// of entries skipped.
///
/// Older logs wrote clicks without a `type`; an untyped entry carrying a
/// `button` is read as a click.
pub fn events_from_entries(entries: Vec<Value>) -> (Vec<TimestampedEvent>, usize) {
    let mut events = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for (index, entry) in entries.into_iter().enumerate() {
        match event_from_entry(entry) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::debug!(index, error = %e, "Unreadable event entry");
                skipped += 1;
            }
        }
    }
    (events, skipped)
}

fn event_from_entry(mut entry: Value) -> Result<TimestampedEvent, serde_json::Error> {
    if let Value::Object(fields) = &mut entry {
        if !fields.contains_key("type") && fields.contains_key("button") {
            fields.insert("type".to_string(), Value::from("click"));
        }
    }
    serde_json::from_value(entry)
}

/// Read an event log file, returning events sorted by time.
pub fn load_events(path: &Path) -> ZoomcastResult<Vec<TimestampedEvent>> {
    if !path.exists() {
        return Err(ZoomcastError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let mut events = parse_events(&content)?;
    sort_by_time(&mut events);
    Ok(events)
}

/// Write events to `path` as a JSON array.
pub fn save_events(path: &Path, events: &[TimestampedEvent]) -> ZoomcastResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(events)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// A pointer position at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerMark {
    pub time: f64,
    pub x: f64,
    pub y: f64,
}

/// An event log split into the streams the effect replay consumes.
///
/// Clicks and moves are kept apart so each can be walked by its own
/// monotonic cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTrace {
    pub clicks: Vec<PointerMark>,
    pub moves: Vec<PointerMark>,
    pub pauses: Vec<PauseInterval>,
}

impl EventTrace {
    /// Build a trace from events in any order.
    pub fn from_events(events: &[TimestampedEvent]) -> Self {
        let mut sorted = events.to_vec();
        sort_by_time(&mut sorted);

        let mut trace = Self::default();
        for event in &sorted {
            match &event.kind {
                EventKind::Click { x, y, .. } => trace.clicks.push(PointerMark {
                    time: event.time,
                    x: *x,
                    y: *y,
                }),
                EventKind::Move { x, y } => trace.moves.push(PointerMark {
                    time: event.time,
                    x: *x,
                    y: *y,
                }),
                EventKind::PauseStart | EventKind::PauseEnd => {}
            }
        }
        trace.pauses = derive_pause_intervals(&sorted);
        trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_wire_format() {
        let event = TimestampedEvent::click(1.5, 400.0, 300.0, "left");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["time"], 1.5);
        assert_eq!(json["type"], "click");
        assert_eq!(json["x"], 400.0);
        assert_eq!(json["button"], "left");
    }

    #[test]
    fn test_pause_marker_has_no_coordinates() {
        let json = serde_json::to_string(&TimestampedEvent::pause_start(2.0)).unwrap();
        assert_eq!(json, r#"{"time":2.0,"type":"pause_start"}"#);
    }

    #[test]
    fn test_parse_integer_coordinates() {
        let json = r#"[
            {"time": 0.0, "type": "move", "x": 10, "y": 20},
            {"time": 0.5, "type": "click", "x": 12, "y": 22, "button": "Button.left"},
            {"time": 0.7, "type": "pause_start"},
            {"time": 1.7, "type": "pause_end"}
        ]"#;
        let events = parse_events(json).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].position(), Some((10.0, 20.0)));
        assert!(matches!(events[2].kind, EventKind::PauseStart));
    }

    #[test]
    fn test_click_without_button_defaults_empty() {
        let events = parse_events(r#"[{"time": 1, "type": "click", "x": 1, "y": 2}]"#).unwrap();
        match &events[0].kind {
            EventKind::Click { button, .. } => assert!(button.is_empty()),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_entries_do_not_sink_the_log() {
        let json = r#"[
            {"time": 0.2, "type": "move", "x": 5, "y": 6},
            {"time": 0.5, "x": 40, "y": 30, "button": "Button.left"},
            {"time": 0.6, "type": "scroll", "x": 1, "y": 1, "dy": -3},
            {"time": 0.7, "type": "move"},
            {"type": "click", "x": 1, "y": 1},
            "garbage",
            {"time": 1.0, "type": "click", "x": 100, "y": 80, "button": "left"}
        ]"#;
        let events = parse_events(json).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, EventKind::Move { x: 5.0, y: 6.0 });
        assert_eq!(
            events[1],
            TimestampedEvent::click(0.5, 40.0, 30.0, "Button.left")
        );
        assert_eq!(events[2], TimestampedEvent::click(1.0, 100.0, 80.0, "left"));

        let trace = EventTrace::from_events(&events);
        assert_eq!(trace.clicks.len(), 2);
    }

    #[test]
    fn test_skipped_entries_are_counted() {
        let entries: Vec<Value> = serde_json::from_str(
            r#"[{"time": 0.1, "type": "pause_start"}, {"time": 0.2, "type": "zoom"}, {}]"#,
        )
        .unwrap();
        let (events, skipped) = events_from_entries(entries);
        assert_eq!(events, vec![TimestampedEvent::pause_start(0.1)]);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_non_array_log_is_an_error() {
        assert!(parse_events(r#"{"time": 1.0, "type": "move"}"#).is_err());
    }

    #[test]
    fn test_trace_splits_streams() {
        let events = vec![
            TimestampedEvent::pointer_move(0.2, 5.0, 5.0),
            TimestampedEvent::click(0.1, 1.0, 1.0, "left"),
            TimestampedEvent::pause_start(0.3),
            TimestampedEvent::pointer_move(0.0, 0.0, 0.0),
            TimestampedEvent::pause_end(0.6),
        ];
        let trace = EventTrace::from_events(&events);
        assert_eq!(trace.clicks.len(), 1);
        assert_eq!(trace.moves.len(), 2);
        assert_eq!(trace.moves[0].time, 0.0);
        assert_eq!(trace.pauses, vec![PauseInterval::new(0.3, 0.6)]);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("zoomcast-events-{}", std::process::id()));
        let path = dir.join("events.json");
        let events = vec![
            TimestampedEvent::click(2.0, 3.0, 4.0, "right"),
            TimestampedEvent::pointer_move(1.0, 1.0, 2.0),
        ];
        save_events(&path, &events).unwrap();
        let loaded = load_events(&path).unwrap();
        assert_eq!(loaded[0], events[1]);
        assert_eq!(loaded[1], events[0]);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_events(Path::new("/nonexistent/zoomcast/events.json")).unwrap_err();
        assert!(matches!(err, ZoomcastError::FileNotFound { .. }));
    }
}
