//! Zoom/pan state machine.
//!
//! Once per frame the state moves a fixed fraction (`smoothing`) of the way
//! toward its target. While a click is fresh the target is the click point
//! at `zoom_max`; otherwise it is the frame center at 1.0.

use serde::{Deserialize, Serialize};
use zoomcast_session_model::Point2D;

/// Session parameters for the effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectParams {
    /// Zoom level held while a click is active.
    pub zoom_max: f64,
    /// Fraction of the remaining distance covered per step, in (0, 1].
    pub smoothing: f64,
    /// Seconds a click keeps the zoom engaged.
    pub zoom_duration: f64,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            zoom_max: 1.3,
            smoothing: 0.15,
            zoom_duration: 1.0,
        }
    }
}

impl EffectParams {
    /// Clamp parameters into their usable ranges.
    pub fn sanitized(self) -> Self {
        Self {
            zoom_max: if self.zoom_max.is_finite() {
                self.zoom_max.max(1.0)
            } else {
                1.0
            },
            smoothing: if self.smoothing.is_finite() {
                self.smoothing.clamp(0.01, 1.0)
            } else {
                0.15
            },
            zoom_duration: if self.zoom_duration.is_finite() {
                self.zoom_duration.max(0.0)
            } else {
                0.0
            },
        }
    }
}

/// Smoothed zoom and pan center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectState {
    pub zoom: f64,
    pub center: Point2D,
    active: bool,
    last_trigger_time: f64,
    trigger_point: Point2D,
}

impl EffectState {
    /// Unzoomed state centered on `center`.
    pub fn new(center: Point2D) -> Self {
        Self {
            zoom: 1.0,
            center,
            active: false,
            last_trigger_time: f64::NEG_INFINITY,
            trigger_point: center,
        }
    }

    /// Start (or restart) the zoom toward `point` at time `at`.
    pub fn trigger(&mut self, at: f64, point: Point2D) {
        self.active = true;
        self.last_trigger_time = at;
        self.trigger_point = point;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Advance one frame.
    pub fn step(&mut self, params: &EffectParams, now: f64, frame_center: Point2D) {
        let (target_zoom, target_center) =
            if self.active && now - self.last_trigger_time < params.zoom_duration {
                (params.zoom_max, self.trigger_point)
            } else {
                self.active = false;
                (1.0, frame_center)
            };

        let k = params.smoothing;
        self.zoom += (target_zoom - self.zoom) * k;
        self.center.x += (target_center.x - self.center.x) * k;
        self.center.y += (target_center.y - self.center.y) * k;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CENTER: Point2D = Point2D { x: 640.0, y: 360.0 };

    #[test]
    fn test_idle_state_stays_put() {
        let params = EffectParams::default();
        let mut state = EffectState::new(CENTER);
        for frame in 0..30 {
            state.step(&params, frame as f64 / 30.0, CENTER);
        }
        assert_eq!(state.zoom, 1.0);
        assert_eq!(state.center, CENTER);
    }

    #[test]
    fn test_trigger_moves_toward_point() {
        let params = EffectParams::default();
        let mut state = EffectState::new(CENTER);
        state.trigger(0.0, Point2D::new(100.0, 100.0));
        state.step(&params, 0.0, CENTER);
        assert!(state.zoom > 1.0);
        assert!(state.center.x < CENTER.x);
        assert!(state.is_active());
    }

    #[test]
    fn test_deactivates_after_duration() {
        let params = EffectParams::default();
        let mut state = EffectState::new(CENTER);
        state.trigger(0.0, Point2D::new(100.0, 100.0));
        state.step(&params, 1.0, CENTER);
        assert!(!state.is_active());
        assert_eq!(state.zoom, 1.0);
    }

    #[test]
    fn test_sanitized_clamps() {
        let params = EffectParams {
            zoom_max: 0.5,
            smoothing: 3.0,
            zoom_duration: -1.0,
        }
        .sanitized();
        assert_eq!(params.zoom_max, 1.0);
        assert_eq!(params.smoothing, 1.0);
        assert_eq!(params.zoom_duration, 0.0);
    }

    proptest! {
        #[test]
        fn prop_converges_from_any_start(
            start_zoom in 1.0f64..8.0,
            sx in -2000.0f64..4000.0,
            sy in -2000.0f64..4000.0,
            smoothing in 0.05f64..1.0,
        ) {
            let params = EffectParams { zoom_max: 2.0, smoothing, zoom_duration: 1.0 };
            let mut state = EffectState::new(Point2D::new(sx, sy));
            state.zoom = start_zoom;
            for frame in 0..600 {
                state.step(&params, frame as f64 / 30.0, CENTER);
            }
            prop_assert!((state.zoom - 1.0).abs() < 1e-3);
            prop_assert!(state.center.distance(&CENTER) < 1.0);
        }

        #[test]
        fn prop_zoom_stays_between_one_and_max(
            clicks in proptest::collection::vec(0usize..300, 0..10),
            smoothing in 0.05f64..1.0,
        ) {
            let params = EffectParams { zoom_max: 1.5, smoothing, zoom_duration: 1.0 };
            let mut state = EffectState::new(CENTER);
            for frame in 0..300usize {
                let t = frame as f64 / 30.0;
                if clicks.contains(&frame) {
                    state.trigger(t, Point2D::new(10.0, 10.0));
                }
                state.step(&params, t, CENTER);
                prop_assert!(state.zoom >= 1.0 - 1e-12);
                prop_assert!(state.zoom <= 1.5 + 1e-12);
            }
        }
    }
}
