//! Recording session management.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use zoomcast_audio_capture::{AudioBackend, AudioCaptureEngine, AudioSettings, CpalBackend};
use zoomcast_common::{
    join_with_timeout, AppConfig, DriftMeasurement, SessionAnchor, ZoomcastError, ZoomcastResult,
};
use zoomcast_effect_core::EffectParams;
use zoomcast_input_tracker::backends::detect_best_backend;
use zoomcast_input_tracker::{InputBackend, InputTracker};
use zoomcast_session_model::{
    derive_pause_intervals, total_paused, AudioMode, CaptureRegion, EffectPass, EventLog,
    SessionManifest, VideoTimeline, MANIFEST_SCHEMA_VERSION,
};

use crate::ffmpeg::{probe_screen_size, FfmpegRawWriter, FfmpegScreenGrabber};
use crate::live::LiveZoomProcessor;
use crate::video::{
    FrameProcessor, FrameSink, FrameSource, PassThrough, VideoCaptureLoop, VideoCaptureReport,
};

/// Video drift beyond this is reported as a warning.
const DRIFT_WARN_MS: f64 = 100.0;

/// Configuration for starting a new recording session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base name for every file the session writes.
    pub name: String,

    /// Directory the intermediate files are written to.
    pub output_dir: PathBuf,

    /// Region to record; `None` records the full screen.
    pub region: Option<CaptureRegion>,

    /// Target frame rate.
    pub fps: u32,

    /// Audio mode, format and gains.
    pub audio: AudioSettings,

    /// Zoom effect parameters.
    pub effects: EffectParams,

    /// Render the effect while recording or afterwards.
    pub effect_pass: EffectPass,

    /// Bounded wait for each capture thread on stop.
    pub join_timeout: Duration,
}

impl SessionConfig {
    /// Session defaults from the user configuration.
    pub fn from_app_config(config: &AppConfig) -> ZoomcastResult<Self> {
        let recording = &config.recording;
        Ok(Self {
            name: default_session_name(),
            output_dir: config.output_dir.clone(),
            region: None,
            fps: recording.fps.max(1),
            audio: AudioSettings::from_defaults(recording)?,
            effects: EffectParams {
                zoom_max: config.effects.zoom_max,
                smoothing: config.effects.smoothing,
                zoom_duration: config.effects.zoom_duration,
            }
            .sanitized(),
            effect_pass: if recording.live_effects {
                EffectPass::Live
            } else {
                EffectPass::Offline
            },
            join_timeout: Duration::from_millis(recording.join_timeout_ms),
        })
    }

    /// Where the session's files go.
    pub fn paths(&self) -> SessionPaths {
        SessionPaths::new(&self.output_dir, &self.name)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            output_dir: PathBuf::from("."),
            region: None,
            fps: 30,
            audio: AudioSettings::default(),
            effects: EffectParams::default(),
            effect_pass: EffectPass::Offline,
            join_timeout: Duration::from_secs(2),
        }
    }
}

/// `Record_<unix seconds>`.
pub fn default_session_name() -> String {
    format!("Record_{}", chrono::Utc::now().timestamp())
}

/// Files written by one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub raw_video: PathBuf,
    pub audio: PathBuf,
    pub events: PathBuf,
    pub manifest: PathBuf,
}

impl SessionPaths {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            raw_video: dir.join(format!("{name}_raw.mkv")),
            audio: dir.join(format!("{name}_audio.wav")),
            events: dir.join(format!("{name}_events.json")),
            manifest: SessionManifest::path_for(dir, name),
        }
    }
}

/// State of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session created but not started.
    Idle,
    /// Recording in progress.
    Recording,
    /// Recording paused.
    Paused,
    /// Recording stopped, files written.
    Stopped,
}

type VideoThread = JoinHandle<ZoomcastResult<VideoCaptureReport>>;

/// A recording session that coordinates all capture streams.
///
/// Video, system audio and microphone each run on their own thread; the
/// input tracker runs as a tokio task. All of them share one
/// [`SessionAnchor`], set by the first captured video frame.
pub struct RecordingSession {
    config: SessionConfig,
    state: SessionState,
    anchor: Arc<SessionAnchor>,
    log: Arc<EventLog>,
    region: Option<CaptureRegion>,
    frame_size: (u32, u32),
    frame_source: Option<Box<dyn FrameSource>>,
    frame_sink: Option<Box<dyn FrameSink>>,
    audio_backend: Option<Arc<dyn AudioBackend>>,
    input_backend: Option<Box<dyn InputBackend>>,
    video_stop_flag: Option<Arc<AtomicBool>>,
    video_thread: Option<VideoThread>,
    audio: Option<AudioCaptureEngine>,
    audio_mode: AudioMode,
    input_stop_flag: Option<Arc<AtomicBool>>,
    input_task: Option<tokio::task::JoinHandle<ZoomcastResult<u64>>>,
}

impl RecordingSession {
    /// Create a new recording session with the given configuration.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            anchor: Arc::new(SessionAnchor::new()),
            log: Arc::new(EventLog::new()),
            region: None,
            frame_size: (0, 0),
            frame_source: None,
            frame_sink: None,
            audio_backend: None,
            input_backend: None,
            video_stop_flag: None,
            video_thread: None,
            audio: None,
            audio_mode: AudioMode::None,
            input_stop_flag: None,
            input_task: None,
        }
    }

    /// Record from `source` instead of the screen.
    pub fn with_frame_source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.frame_source = Some(source);
        self
    }

    /// Write raw frames to `sink` instead of the ffmpeg intermediate.
    pub fn with_frame_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.frame_sink = Some(sink);
        self
    }

    pub fn with_audio_backend(mut self, backend: Arc<dyn AudioBackend>) -> Self {
        self.audio_backend = Some(backend);
        self
    }

    pub fn with_input_backend(mut self, backend: Box<dyn InputBackend>) -> Self {
        self.input_backend = Some(backend);
        self
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn event_log(&self) -> Arc<EventLog> {
        self.log.clone()
    }

    pub fn anchor(&self) -> Arc<SessionAnchor> {
        self.anchor.clone()
    }

    /// Audio mode actually captured (after any downgrade).
    pub fn audio_mode(&self) -> AudioMode {
        self.audio_mode
    }

    /// Active recording time so far.
    pub fn elapsed_secs(&self) -> f64 {
        self.anchor.elapsed_active_secs().unwrap_or(0.0)
    }

    /// Start recording.
    ///
    /// Video is required; audio and input tracking degrade with a warning.
    pub async fn start(&mut self) -> ZoomcastResult<()> {
        if self.state != SessionState::Idle {
            return Err(ZoomcastError::capture("Session already started"));
        }

        tracing::info!(name = %self.config.name, "Starting recording session");
        std::fs::create_dir_all(&self.config.output_dir)?;
        let paths = self.config.paths();
        let fps = self.config.fps.max(1);

        let source: Box<dyn FrameSource> = match self.frame_source.take() {
            Some(source) => source,
            None => {
                let region = self.capture_region();
                Box::new(FfmpegScreenGrabber::start(region, fps)?)
            }
        };
        let (width, height) = source.dimensions();
        let region = self
            .config
            .region
            .map(|r| r.even())
            .unwrap_or_else(|| CaptureRegion::new(0, 0, width, height));
        self.region = Some(region);
        self.frame_size = (width, height);

        let sink: Box<dyn FrameSink> = match self.frame_sink.take() {
            Some(sink) => sink,
            None => Box::new(FfmpegRawWriter::create(&paths.raw_video, width, height, fps)?),
        };

        let processor: Box<dyn FrameProcessor> = match self.config.effect_pass {
            EffectPass::Live => Box::new(LiveZoomProcessor::new(
                self.config.effects,
                width,
                height,
                self.log.clone(),
            )),
            EffectPass::Offline => Box::new(PassThrough),
        };

        let capture = VideoCaptureLoop::new(source, processor, sink, fps, self.anchor.clone());
        self.video_stop_flag = Some(capture.stop_flag());
        let handle = std::thread::Builder::new()
            .name("video-capture".into())
            .spawn(move || capture.run())?;
        self.video_thread = Some(handle);

        // Audio and input discard everything read before the first frame sets the anchor.
        self.start_audio(&paths.audio);
        self.start_input_tracker(region);

        self.state = SessionState::Recording;
        tracing::info!(
            width,
            height,
            fps,
            effect_pass = ?self.config.effect_pass,
            audio = %self.audio_mode,
            "Recording session started"
        );
        Ok(())
    }

    fn capture_region(&self) -> CaptureRegion {
        match self.config.region {
            Some(region) => region.even(),
            None => {
                let (width, height) = probe_screen_size();
                CaptureRegion::new(0, 0, width, height).even()
            }
        }
    }

    fn start_audio(&mut self, path: &Path) {
        if self.config.audio.mode == AudioMode::None {
            return;
        }
        let backend = self
            .audio_backend
            .take()
            .unwrap_or_else(|| Arc::new(CpalBackend::new()));
        let mut engine = AudioCaptureEngine::new(backend, self.anchor.clone());
        if let Err(e) = engine.configure(self.config.audio.clone()) {
            tracing::warn!(error = %e, "Audio configuration rejected, recording without audio");
            return;
        }
        match engine.start_capture(path) {
            Ok(AudioMode::None) => {}
            Ok(mode) => {
                self.audio_mode = mode;
                self.audio = Some(engine);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Audio capture failed to start, recording without audio");
            }
        }
    }

    fn start_input_tracker(&mut self, region: CaptureRegion) {
        let backend = match self.input_backend.take() {
            Some(backend) => backend,
            None => {
                let desktop = if self.config.region.is_none() {
                    (region.width, region.height)
                } else {
                    probe_screen_size()
                };
                detect_best_backend(desktop)
            }
        };
        if !backend.is_available() {
            tracing::warn!(backend = backend.name(), "Input backend unavailable, no pointer events");
            return;
        }
        let mut tracker = InputTracker::new(backend, self.log.clone(), self.anchor.clone(), region);
        self.input_stop_flag = Some(tracker.stop_flag());
        self.input_task = Some(tokio::spawn(async move { tracker.run().await }));
        tracing::info!("Input tracker task started");
    }

    /// Pause recording. Capture threads keep running but nothing is kept.
    pub fn pause(&mut self) -> ZoomcastResult<()> {
        if self.state != SessionState::Recording {
            return Err(ZoomcastError::capture("Not recording"));
        }
        let now = Instant::now();
        if !self.anchor.pause_at(now) {
            return Err(ZoomcastError::capture(
                "Recording has not captured its first frame yet",
            ));
        }
        if let Some(time) = self.anchor.since_origin_at(now) {
            self.log.record_pause_start(time);
        }
        self.state = SessionState::Paused;
        tracing::info!("Recording paused");
        Ok(())
    }

    /// Resume a paused recording.
    pub fn resume(&mut self) -> ZoomcastResult<()> {
        if self.state != SessionState::Paused {
            return Err(ZoomcastError::capture("Not paused"));
        }
        let now = Instant::now();
        let paused = self.anchor.resume_at(now).unwrap_or_default();
        if let Some(time) = self.anchor.since_origin_at(now) {
            self.log.record_pause_end(time);
        }
        self.state = SessionState::Recording;
        tracing::info!(paused_ms = paused.as_millis() as u64, "Recording resumed");
        Ok(())
    }

    /// Pause if recording, resume if paused.
    pub fn toggle_pause(&mut self) -> ZoomcastResult<SessionState> {
        match self.state {
            SessionState::Recording => self.pause()?,
            SessionState::Paused => self.resume()?,
            _ => return Err(ZoomcastError::capture("Session not recording")),
        }
        Ok(self.state)
    }

    /// Stop recording and write the event log and manifest.
    ///
    /// Every loop is flagged first, then each is awaited with a bounded
    /// timeout, and only then are buffers written out. A capture thread
    /// that does not stop in time is logged and left behind.
    pub async fn stop(&mut self) -> ZoomcastResult<SessionManifest> {
        if self.state != SessionState::Recording && self.state != SessionState::Paused {
            return Err(ZoomcastError::capture("Session not recording"));
        }

        tracing::info!("Stopping recording session");
        let timeout = self.config.join_timeout;
        let stopped_at = Instant::now();

        if let Some(flag) = &self.video_stop_flag {
            flag.store(true, Ordering::SeqCst);
        }
        if let Some(flag) = &self.input_stop_flag {
            flag.store(true, Ordering::SeqCst);
        }
        if let Some(audio) = &self.audio {
            audio.request_stop();
        }

        self.await_input_task(timeout).await;
        let report = self.join_video_thread(timeout).await;
        let audio_path = self.finish_audio().await;

        let paths = self.config.paths();
        let events_saved = self.log.save(&paths.events)?;

        let events = self.log.snapshot();
        let stream_end = self.anchor.since_origin_at(stopped_at).unwrap_or(0.0);
        let paused_secs = total_paused(&derive_pause_intervals(&events), stream_end);
        let active_secs = self
            .anchor
            .elapsed_active_at(stopped_at)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let (width, height) = self.frame_size;
        let manifest = SessionManifest {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            name: self.config.name.clone(),
            started_at: self.anchor.origin_wall(),
            raw_video: paths.raw_video.clone(),
            audio: audio_path,
            events: paths.events.clone(),
            width,
            height,
            fps: self.config.fps.max(1),
            region: self.region,
            // The capture loop writes nothing while paused.
            timeline: VideoTimeline::ActiveOnly,
            effect_pass: self.config.effect_pass,
            audio_mode: self.audio_mode,
            frames_written: report.frames_written,
            active_secs,
            paused_secs,
        };
        manifest.save(&paths.manifest)?;

        self.state = SessionState::Stopped;
        self.log_video_drift(&report, active_secs);
        tracing::info!(
            active_secs,
            paused_secs,
            frames = report.frames_written,
            events = events_saved,
            manifest = %paths.manifest.display(),
            "Recording stopped"
        );
        Ok(manifest)
    }

    async fn await_input_task(&mut self, timeout: Duration) {
        let Some(handle) = self.input_task.take() else {
            return;
        };
        let abort = handle.abort_handle();
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(Ok(events))) => tracing::info!(events, "Input tracker flushed"),
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Input tracker exited with error"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Input tracker join failed"),
            Err(_) => {
                abort.abort();
                let err = ZoomcastError::ThreadJoinTimeout {
                    thread: "input-tracker".to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                };
                tracing::warn!(error = %err, "Input tracker did not stop in time");
            }
        }
    }

    async fn join_video_thread(&mut self, timeout: Duration) -> VideoCaptureReport {
        let Some(handle) = self.video_thread.take() else {
            return VideoCaptureReport::default();
        };
        let joined =
            tokio::task::spawn_blocking(move || join_with_timeout(handle, "video-capture", timeout))
                .await;
        match joined {
            Ok(Ok(Ok(report))) => report,
            Ok(Ok(Err(e))) => {
                tracing::warn!(error = %e, "Video capture ended with an error");
                VideoCaptureReport::default()
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Video capture thread did not stop cleanly");
                VideoCaptureReport::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Video join task failed");
                VideoCaptureReport::default()
            }
        }
    }

    async fn finish_audio(&mut self) -> Option<PathBuf> {
        let mut engine = self.audio.take()?;
        let saved = tokio::task::spawn_blocking(move || engine.stop_and_save()).await;
        match saved {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Audio could not be saved, continuing without it");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Audio stop task failed");
                None
            }
        }
    }

    fn log_video_drift(&self, report: &VideoCaptureReport, active_secs: f64) {
        if report.frames_written == 0 {
            return;
        }
        let measurement = DriftMeasurement {
            reference_secs: active_secs,
            measured_secs: report.frames_written as f64 / self.config.fps.max(1) as f64,
        };
        let drift_ms = measurement.drift_ms();
        // One frame of lag is inherent to the count rule.
        if measurement.exceeds_threshold_ms(DRIFT_WARN_MS + 1000.0 / self.config.fps.max(1) as f64) {
            tracing::warn!(drift_ms, "Video length drifts from active time");
        } else {
            tracing::info!(drift_ms, "Video length within threshold of active time");
        }
    }
}
