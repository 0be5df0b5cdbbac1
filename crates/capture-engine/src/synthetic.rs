//! In-process frame source and sink, for tests and dry runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use parking_lot::Mutex;

use zoomcast_common::ZoomcastResult;

use crate::video::{FrameSink, FrameSource};

/// Produces a moving gradient at a fixed real-time rate.
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    interval: Duration,
    started: Instant,
    produced: u64,
}

impl SyntheticFrameSource {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            started: Instant::now(),
            produced: 0,
        }
    }

    fn render(&self) -> RgbImage {
        let shift = (self.produced % 256) as u32;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                ((x + shift) % 256) as u8,
                ((y + shift) % 256) as u8,
                (shift % 256) as u8,
            ])
        })
    }
}

impl FrameSource for SyntheticFrameSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self, timeout: Duration) -> ZoomcastResult<Option<RgbImage>> {
        let due = self.started + self.interval.mul_f64(self.produced as f64);
        let now = Instant::now();
        if due > now {
            let wait = due - now;
            if wait > timeout {
                std::thread::sleep(timeout);
                return Ok(None);
            }
            std::thread::sleep(wait);
        }
        let frame = self.render();
        self.produced += 1;
        Ok(Some(frame))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Keeps every written frame in memory.
#[derive(Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<RgbImage>>>,
    finished: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the written frames.
    pub fn frames(&self) -> Arc<Mutex<Vec<RgbImage>>> {
        self.frames.clone()
    }

    pub fn finished_flag(&self) -> Arc<Mutex<bool>> {
        self.finished.clone()
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> ZoomcastResult<()> {
        self.frames.lock().push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> ZoomcastResult<()> {
        *self.finished.lock() = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_frames_have_requested_size() {
        let mut source = SyntheticFrameSource::new(16, 8, 100);
        let frame = source
            .next_frame(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        assert_eq!(frame.dimensions(), (16, 8));
    }

    #[test]
    fn test_sink_collects_and_finishes() {
        let mut sink = MemorySink::new();
        let frames = sink.frames();
        let finished = sink.finished_flag();
        sink.write_frame(&RgbImage::new(2, 2)).unwrap();
        sink.finish().unwrap();
        assert_eq!(frames.lock().len(), 1);
        assert!(*finished.lock());
    }
}
