//! Live zoom: apply the effect while recording.

use std::sync::Arc;

use image::RgbImage;

use zoomcast_effect_core::{compose_frame, EffectParams, EffectReplayer, FrameEffect};
use zoomcast_session_model::EventLog;

use crate::video::FrameProcessor;

/// Follows the event log as it grows and renders each frame through the
/// same replayer the post-processor uses.
pub struct LiveZoomProcessor {
    replayer: EffectReplayer,
    log: Arc<EventLog>,
    seen: usize,
    last_effect: Option<FrameEffect>,
}

impl LiveZoomProcessor {
    pub fn new(params: EffectParams, width: u32, height: u32, log: Arc<EventLog>) -> Self {
        Self {
            replayer: EffectReplayer::new(params, width, height),
            log,
            seen: 0,
            last_effect: None,
        }
    }

    /// Effect applied to the most recent frame.
    pub fn last_effect(&self) -> Option<&FrameEffect> {
        self.last_effect.as_ref()
    }
}

impl FrameProcessor for LiveZoomProcessor {
    fn process(&mut self, frame: RgbImage, time: f64) -> RgbImage {
        let fresh = self.log.events_since(self.seen);
        self.seen += fresh.len();
        self.replayer.extend(fresh);

        let effect = self.replayer.advance(time);
        self.last_effect = Some(effect);
        compose_frame(&frame, &effect)
    }
}
