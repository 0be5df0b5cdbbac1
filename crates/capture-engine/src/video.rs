//! Video capture loop.
//!
//! Grabs frames at the target rate, runs them through an optional
//! processor and writes them out. The output frame count follows
//! `elapsed_active * fps`: when grabbing falls behind, the current frame is
//! written again until the count catches up. Frames are never dropped.
//! While paused, grabbing continues but nothing is written, and the
//! anchor shift keeps the count continuous across the pause.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbImage;

use zoomcast_common::{SessionAnchor, ZoomcastResult};

/// A source of RGB frames.
pub trait FrameSource: Send {
    /// Frame size in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Wait up to `timeout` for the next frame.
    fn next_frame(&mut self, timeout: Duration) -> ZoomcastResult<Option<RgbImage>>;

    fn name(&self) -> &str;
}

/// Destination for written frames.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> ZoomcastResult<()>;

    /// Flush and close the output. Called once, after the last frame.
    fn finish(&mut self) -> ZoomcastResult<()>;
}

/// Per-frame transformation applied before writing.
pub trait FrameProcessor: Send {
    /// `time` is the frame's position on the event timeline.
    fn process(&mut self, frame: RgbImage, time: f64) -> RgbImage;
}

/// Leaves frames untouched.
pub struct PassThrough;

impl FrameProcessor for PassThrough {
    fn process(&mut self, frame: RgbImage, _time: f64) -> RgbImage {
        frame
    }
}

/// Frame-count bookkeeping for constant-rate output.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    fps: u32,
    written: u64,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            written: 0,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }

    /// `floor(elapsed_active * fps)`.
    pub fn expected_frames(&self, elapsed_active_secs: f64) -> u64 {
        (elapsed_active_secs.max(0.0) * self.fps as f64).floor() as u64
    }

    /// How many copies of the current frame to write: always one, plus
    /// enough duplicates to reach the expected count.
    pub fn frames_to_write(&self, elapsed_active_secs: f64) -> u64 {
        let expected = self.expected_frames(elapsed_active_secs);
        1 + expected.saturating_sub(self.written + 1)
    }

    pub fn record_written(&mut self, count: u64) {
        self.written += count;
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoCaptureReport {
    pub frames_grabbed: u64,
    pub frames_written: u64,
    pub frames_duplicated: u64,
    pub frames_skipped_paused: u64,
}

/// Owns the source, processor and sink for one recording.
pub struct VideoCaptureLoop {
    source: Box<dyn FrameSource>,
    processor: Box<dyn FrameProcessor>,
    sink: Box<dyn FrameSink>,
    pacer: FramePacer,
    anchor: Arc<SessionAnchor>,
    stop_flag: Arc<AtomicBool>,
    grab_timeout: Duration,
}

impl VideoCaptureLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        processor: Box<dyn FrameProcessor>,
        sink: Box<dyn FrameSink>,
        fps: u32,
        anchor: Arc<SessionAnchor>,
    ) -> Self {
        Self {
            source,
            processor,
            sink,
            pacer: FramePacer::new(fps),
            anchor,
            stop_flag: Arc::new(AtomicBool::new(false)),
            grab_timeout: Duration::from_millis(500),
        }
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Run until the stop flag is set or the source fails.
    ///
    /// The first grabbed frame sets the session anchor if nobody has yet.
    /// The sink is finished on every exit path.
    pub fn run(mut self) -> ZoomcastResult<VideoCaptureReport> {
        let mut report = VideoCaptureReport::default();
        let interval = self.pacer.frame_interval();
        tracing::info!(
            source = self.source.name(),
            fps = self.pacer.fps(),
            "Video capture started"
        );

        let result = self.capture_frames(&mut report, interval);
        let finished = self.sink.finish();

        tracing::info!(
            grabbed = report.frames_grabbed,
            written = report.frames_written,
            duplicated = report.frames_duplicated,
            skipped_paused = report.frames_skipped_paused,
            "Video capture stopped"
        );
        result?;
        finished?;
        Ok(report)
    }

    fn capture_frames(
        &mut self,
        report: &mut VideoCaptureReport,
        interval: Duration,
    ) -> ZoomcastResult<()> {
        while !self.stop_flag.load(Ordering::Relaxed) {
            let loop_start = Instant::now();

            let frame = match self.source.next_frame(self.grab_timeout) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Frame grab failed, stopping video capture");
                    break;
                }
            };
            report.frames_grabbed += 1;

            if self.anchor.set(loop_start) {
                tracing::info!("Session anchor set by first video frame");
            }
            if self.anchor.is_paused() {
                report.frames_skipped_paused += 1;
                continue;
            }

            let now = Instant::now();
            let elapsed = self
                .anchor
                .elapsed_active_at(now)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            let time = self.anchor.since_origin_at(now).unwrap_or(0.0);

            let processed = self.processor.process(frame, time);
            let copies = self.pacer.frames_to_write(elapsed);
            for _ in 0..copies {
                self.sink.write_frame(&processed)?;
            }
            self.pacer.record_written(copies);
            report.frames_written += copies;
            report.frames_duplicated += copies - 1;

            if let Some(wait) = interval.checked_sub(loop_start.elapsed()) {
                std::thread::sleep(wait);
            }
        }
        Ok(())
    }
}
