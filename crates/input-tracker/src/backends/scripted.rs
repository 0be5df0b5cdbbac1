//! Scripted backend: replays pre-loaded samples.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use zoomcast_common::ZoomcastResult;

use crate::{InputBackend, PointerSample};

/// Replays samples, each after its delay from the first poll.
pub struct ScriptedBackend {
    script: VecDeque<(Duration, PointerSample)>,
    started: Option<Instant>,
    position: Option<(f64, f64)>,
}

impl ScriptedBackend {
    /// Samples delivered at the given offsets from the first poll.
    pub fn new(script: Vec<(Duration, PointerSample)>) -> Self {
        let mut script = script;
        script.sort_by_key(|(delay, _)| *delay);
        Self {
            script: script.into(),
            started: None,
            position: None,
        }
    }

    /// Samples delivered as fast as they are polled.
    pub fn immediate(samples: Vec<PointerSample>) -> Self {
        Self::new(samples.into_iter().map(|s| (Duration::ZERO, s)).collect())
    }

    /// A backend that never produces samples.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some((x, y));
        self
    }
}

impl InputBackend for ScriptedBackend {
    fn poll(&mut self) -> ZoomcastResult<Option<PointerSample>> {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = matches!(self.script.front(), Some((delay, _)) if started.elapsed() >= *delay);
        if !due {
            return Ok(None);
        }
        let sample = self.script.pop_front().map(|(_, sample)| sample);
        if let Some(PointerSample::Move { x, y } | PointerSample::Click { x, y, .. }) = sample {
            self.position = Some((x, y));
        }
        Ok(sample)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn position(&self) -> Option<(f64, f64)> {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_wait_for_their_delay() {
        let mut backend = ScriptedBackend::new(vec![
            (Duration::ZERO, PointerSample::Move { x: 1.0, y: 2.0 }),
            (Duration::from_secs(60), PointerSample::Move { x: 3.0, y: 4.0 }),
        ]);
        assert!(backend.poll().unwrap().is_some());
        assert!(backend.poll().unwrap().is_none());
        assert_eq!(backend.position(), Some((1.0, 2.0)));
    }

    #[test]
    fn test_empty_never_yields() {
        let mut backend = ScriptedBackend::empty();
        assert!(backend.poll().unwrap().is_none());
        assert!(backend.position().is_none());
    }
}
