//! Frame-by-frame replay of an event trace.

use serde::Serialize;
use zoomcast_session_model::{EventKind, Point2D, PointerMark, TimestampedEvent};

use crate::crop::CropWindow;
use crate::effect::{EffectParams, EffectState};

/// How long a click ripple stays visible (seconds).
pub const RIPPLE_DURATION_SECS: f64 = 0.5;

/// Ripple radius at the end of its window (output pixels).
pub const RIPPLE_MAX_RADIUS: f64 = 50.0;

/// A click ripple placed in output coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ripple {
    pub center: Point2D,
    pub radius: u32,
    /// 1.0 when the click happens, fading to 0.0 at the end of the window.
    pub opacity: f64,
}

/// Everything needed to render one output frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameEffect {
    /// Time on the event timeline.
    pub time: f64,
    pub zoom: f64,
    pub center: Point2D,
    pub crop: CropWindow,
    /// Cursor tip in output coordinates.
    pub cursor: Option<Point2D>,
    pub ripple: Option<Ripple>,
}

/// Drives an [`EffectState`] from a click stream and a move stream.
///
/// Each stream has its own monotonic cursor. `advance` must be called with
/// non-decreasing times; events at or before that time are consumed.
#[derive(Debug, Clone)]
pub struct EffectReplayer {
    params: EffectParams,
    frame_width: u32,
    frame_height: u32,
    state: EffectState,
    clicks: Vec<PointerMark>,
    moves: Vec<PointerMark>,
    next_click: usize,
    next_move: usize,
    cursor: Option<Point2D>,
    last_click: Option<(f64, Point2D)>,
}

impl EffectReplayer {
    pub fn new(params: EffectParams, frame_width: u32, frame_height: u32) -> Self {
        Self {
            params: params.sanitized(),
            frame_width,
            frame_height,
            state: EffectState::new(Point2D::frame_center(frame_width, frame_height)),
            clicks: Vec::new(),
            moves: Vec::new(),
            next_click: 0,
            next_move: 0,
            cursor: None,
            last_click: None,
        }
    }

    /// Replayer preloaded with time-sorted clicks and moves.
    pub fn with_trace(
        params: EffectParams,
        frame_width: u32,
        frame_height: u32,
        clicks: Vec<PointerMark>,
        moves: Vec<PointerMark>,
    ) -> Self {
        let mut replayer = Self::new(params, frame_width, frame_height);
        replayer.clicks = clicks;
        replayer.moves = moves;
        replayer
    }

    /// Feed events as they arrive. Pause markers are ignored.
    pub fn extend(&mut self, events: impl IntoIterator<Item = TimestampedEvent>) {
        for event in events {
            match event.kind {
                EventKind::Click { x, y, .. } => {
                    insert_pending(&mut self.clicks, self.next_click, event.time, x, y)
                }
                EventKind::Move { x, y } => {
                    insert_pending(&mut self.moves, self.next_move, event.time, x, y)
                }
                EventKind::PauseStart | EventKind::PauseEnd => {}
            }
        }
    }

    pub fn state(&self) -> &EffectState {
        &self.state
    }

    pub fn params(&self) -> &EffectParams {
        &self.params
    }

    /// Consume events up to `time`, step the state once and place overlays.
    pub fn advance(&mut self, time: f64) -> FrameEffect {
        while let Some(click) = self.clicks.get(self.next_click) {
            if click.time > time {
                break;
            }
            let point = Point2D::new(click.x, click.y);
            // The effect starts on the frame that consumes the click.
            self.state.trigger(time, point);
            self.last_click = Some((time, point));
            self.next_click += 1;
        }

        while let Some(mark) = self.moves.get(self.next_move) {
            if mark.time > time {
                break;
            }
            self.cursor = Some(Point2D::new(mark.x, mark.y));
            self.next_move += 1;
        }

        let frame_center = Point2D::frame_center(self.frame_width, self.frame_height);
        self.state.step(&self.params, time, frame_center);

        let crop = CropWindow::compute(
            self.frame_width,
            self.frame_height,
            self.state.zoom,
            self.state.center,
        );

        let ripple = self.last_click.and_then(|(at, point)| {
            let age = time - at;
            if (0.0..RIPPLE_DURATION_SECS).contains(&age) {
                let progress = age / RIPPLE_DURATION_SECS;
                Some(Ripple {
                    center: crop.project(point),
                    radius: (progress * RIPPLE_MAX_RADIUS) as u32,
                    opacity: 1.0 - progress,
                })
            } else {
                None
            }
        });

        FrameEffect {
            time,
            zoom: self.state.zoom,
            center: self.state.center,
            crop,
            cursor: self.cursor.map(|p| crop.project(p)),
            ripple,
        }
    }
}

/// Insert into the unconsumed tail, keeping it sorted by time.
fn insert_pending(marks: &mut Vec<PointerMark>, consumed: usize, time: f64, x: f64, y: f64) {
    let tail = &marks[consumed..];
    let offset = tail.partition_point(|m| m.time <= time);
    marks.insert(consumed + offset, PointerMark { time, x, y });
}
