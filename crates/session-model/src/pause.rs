//! Pause intervals derived from pause markers.

use crate::event::{EventKind, TimestampedEvent};

/// A span of the recording timeline that was paused.
///
/// `end` is `f64::INFINITY` when the session stopped while still paused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PauseInterval {
    pub start: f64,
    pub end: f64,
}

impl PauseInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Half-open containment: `start <= t < end`.
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_open(&self) -> bool {
        self.end.is_infinite()
    }
}

/// Pair `pause_start`/`pause_end` markers in order.
///
/// Events must already be sorted by time. A repeated `pause_start` while
/// a pause is open is ignored, as is a `pause_end` with no open pause,
/// so the result is always non-overlapping and ordered.
pub fn derive_pause_intervals(events: &[TimestampedEvent]) -> Vec<PauseInterval> {
    let mut intervals = Vec::new();
    let mut open: Option<f64> = None;

    for event in events {
        match event.kind {
            EventKind::PauseStart if open.is_none() => open = Some(event.time),
            EventKind::PauseEnd => {
                if let Some(start) = open.take() {
                    intervals.push(PauseInterval::new(start, event.time.max(start)));
                }
            }
            _ => {}
        }
    }

    if let Some(start) = open {
        intervals.push(PauseInterval::new(start, f64::INFINITY));
    }
    intervals
}

/// Whether `t` falls inside any interval.
pub fn is_paused_at(intervals: &[PauseInterval], t: f64) -> bool {
    intervals.iter().any(|interval| interval.contains(t))
}

/// Total closed pause time. Open intervals are measured up to `stream_end`.
pub fn total_paused(intervals: &[PauseInterval], stream_end: f64) -> f64 {
    intervals
        .iter()
        .map(|interval| (interval.end.min(stream_end) - interval.start).max(0.0))
        .sum()
}

/// Map a time on the active timeline (paused spans removed) onto the
/// recording timeline by re-inserting the pauses that precede it.
///
/// A time equal to a pause start maps past that pause, since the frame
/// captured at that instant was captured after resuming.
pub fn active_to_recording_time(intervals: &[PauseInterval], active: f64) -> f64 {
    let mut t = active;
    for interval in intervals {
        if interval.start <= t {
            t += interval.duration();
        } else {
            break;
        }
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pairs_in_order() {
        let events = vec![
            TimestampedEvent::pause_start(2.0),
            TimestampedEvent::pointer_move(3.0, 1.0, 1.0),
            TimestampedEvent::pause_end(4.0),
            TimestampedEvent::pause_start(6.0),
            TimestampedEvent::pause_end(6.5),
        ];
        let intervals = derive_pause_intervals(&events);
        assert_eq!(
            intervals,
            vec![PauseInterval::new(2.0, 4.0), PauseInterval::new(6.0, 6.5)]
        );
        assert!((total_paused(&intervals, 10.0) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_unterminated_pause_runs_to_end() {
        let intervals = derive_pause_intervals(&[TimestampedEvent::pause_start(5.0)]);
        assert_eq!(intervals.len(), 1);
        assert!(intervals[0].is_open());
        assert!(intervals[0].contains(1_000.0));
        assert!((total_paused(&intervals, 8.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stray_markers_ignored() {
        let events = vec![
            TimestampedEvent::pause_end(1.0),
            TimestampedEvent::pause_start(2.0),
            TimestampedEvent::pause_start(2.5),
            TimestampedEvent::pause_end(3.0),
        ];
        assert_eq!(
            derive_pause_intervals(&events),
            vec![PauseInterval::new(2.0, 3.0)]
        );
    }

    #[test]
    fn test_half_open_bounds() {
        let interval = PauseInterval::new(2.0, 4.0);
        assert!(interval.contains(2.0));
        assert!(interval.contains(3.999));
        assert!(!interval.contains(4.0));
        assert!(!interval.contains(1.999));
    }

    #[test]
    fn test_active_to_recording_time() {
        let intervals = vec![PauseInterval::new(2.0, 4.0), PauseInterval::new(6.0, 7.0)];
        assert_eq!(active_to_recording_time(&intervals, 1.0), 1.0);
        assert_eq!(active_to_recording_time(&intervals, 2.0), 4.0);
        assert_eq!(active_to_recording_time(&intervals, 3.5), 5.5);
        assert_eq!(active_to_recording_time(&intervals, 4.0), 7.0);
        assert_eq!(active_to_recording_time(&intervals, 5.0), 8.0);
    }

    proptest! {
        #[test]
        fn prop_interval_sum_equals_paused_time(
            spans in proptest::collection::vec((0.01f64..5.0, 0.01f64..5.0), 0..8)
        ) {
            // Alternate active/paused spans and log markers on one timeline.
            let mut t = 0.0;
            let mut events = Vec::new();
            let mut expected = 0.0;
            for (active, paused) in spans {
                t += active;
                events.push(TimestampedEvent::pause_start(t));
                t += paused;
                expected += paused;
                events.push(TimestampedEvent::pause_end(t));
            }
            let intervals = derive_pause_intervals(&events);
            let total = total_paused(&intervals, t);
            prop_assert!((total - expected).abs() < 1e-6);
            for pair in intervals.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
        }
    }
}
