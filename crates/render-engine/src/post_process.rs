//! Offline effect pass over a recorded session.
//!
//! Replays the event log against the decoded raw video one frame at a
//! time, drops paused spans, draws the zoom, cursor and ripple, and hands
//! the silent result plus the mixed audio to the [`EncoderGateway`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use zoomcast_common::{ZoomcastError, ZoomcastResult};
use zoomcast_effect_core::{compose_frame, EffectParams, EffectReplayer, FrameEffect};
use zoomcast_session_model::{
    active_to_recording_time, derive_pause_intervals, is_paused_at, load_events, sort_by_time,
    EventTrace, QualityTier, SessionManifest, TimestampedEvent, VideoTimeline,
};

use crate::encoder::{EncoderGateway, RenderedArtifact};
use crate::frames::{
    repair_container, FfmpegFrameDecoder, FfmpegFrameWriter, FrameDecoder, ProcessedFrameWriter,
};

/// Frames between two progress reports.
const PROGRESS_EVERY_FRAMES: u64 = 30;

/// Progress callback for post-processing.
pub type ProgressCallback = Box<dyn Fn(ProcessProgress) + Send>;

/// Post-processing progress report.
#[derive(Debug, Clone)]
pub struct ProcessProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Source frames read so far.
    pub frames_read: u64,

    /// Source frames expected, 0 when unknown.
    pub total_frames: u64,

    /// Frames dropped because they fall inside a pause.
    pub frames_cut: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    pub stage: ProcessStage,
}

/// Stages of post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStage {
    Preparing,
    Repairing,
    Rendering,
    Encoding,
    Complete,
}

/// Everything needed to post-process one session.
#[derive(Debug, Clone)]
pub struct PostProcessJob {
    /// Raw recorded video.
    pub video: PathBuf,

    /// Mixed audio, if any was recorded.
    pub audio: Option<PathBuf>,

    /// Event log JSON.
    pub events: PathBuf,

    /// Final output path.
    pub output: PathBuf,

    pub quality: QualityTier,

    /// How raw video time relates to event time.
    pub timeline: VideoTimeline,

    /// Frame rate to assume when the container reports none.
    pub fallback_fps: f64,

    /// Keep the silent processed video and any repaired container.
    pub keep_intermediates: bool,
}

impl PostProcessJob {
    /// Job for a session written by the recorder.
    pub fn from_manifest(manifest: &SessionManifest, output: PathBuf, quality: QualityTier) -> Self {
        Self {
            video: manifest.raw_video.clone(),
            audio: manifest.audio.clone(),
            events: manifest.events.clone(),
            output,
            quality,
            timeline: manifest.timeline,
            fallback_fps: manifest.fps.max(1) as f64,
            keep_intermediates: false,
        }
    }

    /// Job for a continuous recording made outside the recorder, where pause
    /// spans are still in the video and get cut. Without `events` the log is
    /// looked up next to the video (see [`default_events_path`]).
    pub fn from_files(
        video: PathBuf,
        events: Option<PathBuf>,
        audio: Option<PathBuf>,
        output: PathBuf,
        quality: QualityTier,
    ) -> Self {
        let events = events.unwrap_or_else(|| default_events_path(&video));
        Self {
            video,
            audio,
            events,
            output,
            quality,
            timeline: VideoTimeline::Continuous,
            fallback_fps: 30.0,
            keep_intermediates: false,
        }
    }

    /// Where the silent processed video is written before muxing.
    pub fn intermediate_path(&self) -> PathBuf {
        let stem = self
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        self.output
            .with_file_name(format!("{stem}_processed_video.mkv"))
    }
}

/// `<name>_events.json` beside a `<name>_raw.*` or `<name>.*` video.
pub fn default_events_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = stem.strip_suffix("_raw").unwrap_or(&stem);
    video.with_file_name(format!("{name}_events.json"))
}

/// Counters and the per-frame effect trace of one render.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessReport {
    pub frames_read: u64,
    pub frames_written: u64,
    pub frames_cut: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Whether the raw container had to be repaired first.
    pub repaired: bool,
    /// Effect applied to each written frame, in output order.
    pub effects: Vec<FrameEffect>,
}

impl ProcessReport {
    pub fn output_secs(&self) -> f64 {
        if self.fps <= 0.0 {
            0.0
        } else {
            self.frames_written as f64 / self.fps
        }
    }

    /// Write the report, effect trace included, as pretty JSON.
    pub fn save(&self, path: &Path) -> ZoomcastResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Result of a full post-processing run.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub artifact: RenderedArtifact,
    pub report: ProcessReport,
}

/// Offline renderer for the smart-zoom effect.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    params: EffectParams,
    gateway: EncoderGateway,
}

impl PostProcessor {
    pub fn new(params: EffectParams) -> Self {
        Self {
            params: params.sanitized(),
            gateway: EncoderGateway::new(),
        }
    }

    pub fn with_gateway(mut self, gateway: EncoderGateway) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn params(&self) -> &EffectParams {
        &self.params
    }

    /// Replay `events` over every frame from `decoder` into `writer`.
    ///
    /// With [`VideoTimeline::Continuous`] a frame's event time is its
    /// position in the stream and frames inside a pause are dropped. With
    /// [`VideoTimeline::ActiveOnly`] the stream holds no paused frames, so
    /// each position is moved past the pauses before it and nothing is cut.
    pub fn render_frames(
        &self,
        decoder: &mut dyn FrameDecoder,
        writer: &mut dyn ProcessedFrameWriter,
        events: &[TimestampedEvent],
        timeline: VideoTimeline,
        progress: Option<&dyn Fn(ProcessProgress)>,
    ) -> ZoomcastResult<ProcessReport> {
        let info = decoder.info();
        let fps = if info.fps > 0.0 { info.fps } else { 30.0 };

        let mut sorted = events.to_vec();
        sort_by_time(&mut sorted);
        let pauses = derive_pause_intervals(&sorted);
        let trace = EventTrace::from_events(&sorted);
        if !pauses.is_empty() {
            tracing::info!(count = pauses.len(), ?timeline, "Pause intervals detected");
        }

        let mut replayer = EffectReplayer::with_trace(
            self.params,
            info.width,
            info.height,
            trace.clicks,
            trace.moves,
        );

        let mut report = ProcessReport {
            width: info.width,
            height: info.height,
            fps,
            ..ProcessReport::default()
        };
        let started = Instant::now();

        while let Some(frame) = decoder.next_frame()? {
            let position = report.frames_read as f64 / fps;
            report.frames_read += 1;

            let time = match timeline {
                VideoTimeline::Continuous => {
                    if is_paused_at(&pauses, position) {
                        report.frames_cut += 1;
                        continue;
                    }
                    position
                }
                VideoTimeline::ActiveOnly => active_to_recording_time(&pauses, position),
            };

            let effect = replayer.advance(time);
            let rendered = compose_frame(&frame, &effect);
            writer.write_frame(&rendered)?;
            report.frames_written += 1;
            report.effects.push(effect);

            if report.frames_read % PROGRESS_EVERY_FRAMES == 0 {
                tracing::debug!(
                    frames_read = report.frames_read,
                    frames_written = report.frames_written,
                    "Post-processing"
                );
                if let Some(cb) = progress {
                    cb(ProcessProgress {
                        progress: 0.0,
                        frames_read: report.frames_read,
                        total_frames: 0,
                        frames_cut: report.frames_cut,
                        eta_secs: 0.0,
                        stage: ProcessStage::Rendering,
                    });
                }
            }
        }

        decoder.finish()?;
        tracing::info!(
            frames_read = report.frames_read,
            frames_written = report.frames_written,
            frames_cut = report.frames_cut,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Effect pass complete"
        );
        Ok(report)
    }

    /// Post-process a recorded session end to end.
    ///
    /// A raw container that cannot be decoded gets one stream-copy repair
    /// attempt. Encoder failures degrade the output instead of failing.
    pub fn process(
        &self,
        job: &PostProcessJob,
        progress: Option<ProgressCallback>,
    ) -> ZoomcastResult<ProcessOutcome> {
        tracing::info!(
            video = %job.video.display(),
            output = %job.output.display(),
            quality = %job.quality,
            timeline = ?job.timeline,
            "Starting post-processing"
        );
        if !job.video.exists() {
            return Err(ZoomcastError::FileNotFound {
                path: job.video.clone(),
            });
        }
        if let Some(parent) = job.output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        report_stage(&progress, ProcessStage::Preparing, 0.0);

        let events = match load_events(&job.events) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "Event log unavailable, rendering without effects");
                Vec::new()
            }
        };

        let intermediate = job.intermediate_path();
        let mut repaired: Option<PathBuf> = None;
        let mut outcome = self.render_to(&job.video, &intermediate, &events, job, &progress);

        let needs_repair = match &outcome {
            Ok(report) => report.frames_read == 0,
            Err(e) => !matches!(e, ZoomcastError::EncoderUnavailable { .. }),
        };
        if needs_repair {
            match &outcome {
                Ok(_) => tracing::warn!("Raw video decoded to zero frames"),
                Err(e) => tracing::warn!(error = %e, "Raw video could not be decoded"),
            }
            report_stage(&progress, ProcessStage::Repairing, 0.0);
            let fixed = repair_container(&job.video).map_err(|e| {
                tracing::error!(error = %e, "Container repair failed");
                ZoomcastError::ContainerCorrupt {
                    path: job.video.clone(),
                }
            })?;
            outcome = self
                .render_to(&fixed, &intermediate, &events, job, &progress)
                .and_then(|report| {
                    if report.frames_read == 0 {
                        Err(ZoomcastError::ContainerCorrupt {
                            path: job.video.clone(),
                        })
                    } else {
                        Ok(report)
                    }
                });
            repaired = Some(fixed);
        }

        let mut report = match outcome {
            Ok(report) => report,
            Err(e) => {
                cleanup(&[Some(intermediate.as_path()), repaired.as_deref()], job.keep_intermediates);
                return Err(e);
            }
        };
        report.repaired = repaired.is_some();

        report_stage(&progress, ProcessStage::Encoding, 1.0);
        let artifact = self.gateway.mux(
            &intermediate,
            job.audio.as_deref(),
            job.quality,
            &job.output,
        )?;

        cleanup(&[Some(intermediate.as_path()), repaired.as_deref()], job.keep_intermediates);
        report_stage(&progress, ProcessStage::Complete, 1.0);

        tracing::info!(
            output = %artifact.path.display(),
            audio = artifact.audio_included,
            degraded = artifact.degraded,
            output_secs = report.output_secs(),
            "Post-processing complete"
        );
        Ok(ProcessOutcome { artifact, report })
    }

    fn render_to(
        &self,
        video: &Path,
        intermediate: &Path,
        events: &[TimestampedEvent],
        job: &PostProcessJob,
        progress: &Option<ProgressCallback>,
    ) -> ZoomcastResult<ProcessReport> {
        let mut decoder = FfmpegFrameDecoder::open(video, job.fallback_fps)?;
        let info = decoder.info();
        let total_frames = probe_frame_budget(video, info.fps);
        let mut writer = FfmpegFrameWriter::create(intermediate, info.width, info.height, info.fps)?;

        let started = Instant::now();
        let scaled = |mut p: ProcessProgress| {
            let Some(cb) = progress else {
                return;
            };
            p.total_frames = total_frames;
            if total_frames > 0 {
                p.progress = (p.frames_read as f64 / total_frames as f64).clamp(0.0, 1.0);
                let elapsed = started.elapsed().as_secs_f64();
                p.eta_secs = if p.progress > 0.0 {
                    (elapsed / p.progress - elapsed).max(0.0)
                } else {
                    0.0
                };
            }
            cb(p);
        };

        let result =
            self.render_frames(&mut decoder, &mut writer, events, job.timeline, Some(&scaled));
        let report = result?;
        writer.finish()?;
        Ok(report)
    }
}

/// Frame count from the container duration, 0 when unknown.
fn probe_frame_budget(video: &Path, fps: f64) -> u64 {
    zoomcast_common::ffmpeg::probe_duration(video)
        .map(|secs| (secs * fps).round() as u64)
        .unwrap_or(0)
}

fn report_stage(progress: &Option<ProgressCallback>, stage: ProcessStage, value: f64) {
    if let Some(cb) = progress {
        cb(ProcessProgress {
            progress: value,
            frames_read: 0,
            total_frames: 0,
            frames_cut: 0,
            eta_secs: 0.0,
            stage,
        });
    }
}

fn cleanup(paths: &[Option<&Path>], keep: bool) {
    if keep {
        return;
    }
    for path in paths.iter().flatten() {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(error = %e, path = %path.display(), "Could not remove intermediate file");
            }
        }
    }
}

/// Post-process on a blocking worker thread.
pub async fn process_session(
    processor: PostProcessor,
    job: PostProcessJob,
    progress: Option<ProgressCallback>,
) -> ZoomcastResult<ProcessOutcome> {
    tokio::task::spawn_blocking(move || processor.process(&job, progress))
        .await
        .map_err(|e| ZoomcastError::render(format!("post-processing task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{MemoryFrameDecoder, MemoryFrameWriter};
    use image::RgbImage;

    fn frames(count: usize) -> Vec<RgbImage> {
        vec![RgbImage::new(64, 36); count]
    }

    #[test]
    fn test_continuous_timeline_cuts_pause() {
        let processor = PostProcessor::new(EffectParams::default());
        let mut decoder = MemoryFrameDecoder::new(frames(300), 30.0);
        let mut writer = MemoryFrameWriter::new();
        let written = writer.frames();
        let events = vec![
            TimestampedEvent::pause_start(2.0),
            TimestampedEvent::pause_end(4.0),
        ];

        let report = processor
            .render_frames(
                &mut decoder,
                &mut writer,
                &events,
                VideoTimeline::Continuous,
                None,
            )
            .unwrap();

        assert_eq!(report.frames_read, 300);
        assert_eq!(report.frames_cut, 60);
        assert_eq!(report.frames_written, 240);
        assert_eq!(written.lock().len(), 240);
        assert!((report.output_secs() - 8.0).abs() < 1e-9);
        assert!(report
            .effects
            .iter()
            .all(|e| !(2.0..4.0).contains(&e.time)));
    }

    #[test]
    fn test_active_only_timeline_keeps_every_frame() {
        let processor = PostProcessor::new(EffectParams::default());
        let mut decoder = MemoryFrameDecoder::new(frames(240), 30.0);
        let mut writer = MemoryFrameWriter::new();
        let events = vec![
            TimestampedEvent::pause_start(2.0),
            TimestampedEvent::pause_end(4.0),
            TimestampedEvent::click(5.0, 10.0, 10.0, "left"),
        ];

        let report = processor
            .render_frames(
                &mut decoder,
                &mut writer,
                &events,
                VideoTimeline::ActiveOnly,
                None,
            )
            .unwrap();

        assert_eq!(report.frames_written, 240);
        assert_eq!(report.frames_cut, 0);
        // Frame 60 was captured right after resuming.
        assert!((report.effects[60].time - 4.0).abs() < 1e-9);
        // The click at 5.0s lands on active frame 90.
        assert!((report.effects[89].zoom - 1.0).abs() < 1e-9);
        assert!(report.effects[90].zoom > 1.0);
    }

    #[test]
    fn test_progress_is_reported_while_rendering() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicU64::new(0));
        let seen = calls.clone();
        let cb: ProgressCallback = Box::new(move |p| {
            assert_eq!(p.stage, ProcessStage::Rendering);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let processor = PostProcessor::new(EffectParams::default());
        let mut decoder = MemoryFrameDecoder::new(frames(90), 30.0);
        let mut writer = MemoryFrameWriter::new();
        processor
            .render_frames(
                &mut decoder,
                &mut writer,
                &[],
                VideoTimeline::Continuous,
                Some(cb.as_ref()),
            )
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_job_from_files_cuts_pauses_and_finds_the_log() {
        let job = PostProcessJob::from_files(
            PathBuf::from("/rec/demo_raw.mkv"),
            None,
            None,
            PathBuf::from("/rec/demo.mp4"),
            QualityTier::High,
        );
        assert_eq!(job.timeline, VideoTimeline::Continuous);
        assert_eq!(job.events, PathBuf::from("/rec/demo_events.json"));

        let explicit = PostProcessJob::from_files(
            PathBuf::from("/captures/screen.mp4"),
            Some(PathBuf::from("/logs/clicks.json")),
            Some(PathBuf::from("/captures/voice.wav")),
            PathBuf::from("/out/screen_zoomed.mp4"),
            QualityTier::Low,
        );
        assert_eq!(explicit.events, PathBuf::from("/logs/clicks.json"));
        assert_eq!(
            default_events_path(Path::new("/captures/screen.mp4")),
            PathBuf::from("/captures/screen_events.json")
        );
    }

    #[test]
    fn test_intermediate_path_is_next_to_output() {
        let job = PostProcessJob {
            video: PathBuf::from("/rec/a_raw.mkv"),
            audio: None,
            events: PathBuf::from("/rec/a_events.json"),
            output: PathBuf::from("/out/final.mp4"),
            quality: QualityTier::Medium,
            timeline: VideoTimeline::Continuous,
            fallback_fps: 30.0,
            keep_intermediates: false,
        };
        assert_eq!(
            job.intermediate_path(),
            PathBuf::from("/out/final_processed_video.mkv")
        );
    }

    #[test]
    fn test_missing_video_fails_before_work() {
        let job = PostProcessJob {
            video: PathBuf::from("/nonexistent/zoomcast_raw.mkv"),
            audio: None,
            events: PathBuf::from("/nonexistent/zoomcast_events.json"),
            output: std::env::temp_dir().join("zoomcast-never-written.mp4"),
            quality: QualityTier::Low,
            timeline: VideoTimeline::Continuous,
            fallback_fps: 30.0,
            keep_intermediates: false,
        };
        let err = PostProcessor::new(EffectParams::default())
            .process(&job, None)
            .unwrap_err();
        assert!(matches!(err, ZoomcastError::FileNotFound { .. }));
    }

    proptest::proptest! {
        #[test]
        fn test_cut_frames_never_reach_the_output(
            start_frame in 0u32..80,
            length in 1u32..40,
        ) {
            let start = start_frame as f64 / 10.0;
            let end = start + length as f64 / 10.0;
            let events = vec![
                TimestampedEvent::pause_start(start),
                TimestampedEvent::pause_end(end),
            ];
            let processor = PostProcessor::new(EffectParams::default());
            let mut decoder = MemoryFrameDecoder::new(vec![RgbImage::new(4, 4); 100], 10.0);
            let mut writer = MemoryFrameWriter::new();

            let report = processor
                .render_frames(&mut decoder, &mut writer, &events, VideoTimeline::Continuous, None)
                .unwrap();

            proptest::prop_assert_eq!(report.frames_written + report.frames_cut, 100);
            proptest::prop_assert!(report.effects.iter().all(|e| e.time < start || e.time >= end));
        }
    }
}
