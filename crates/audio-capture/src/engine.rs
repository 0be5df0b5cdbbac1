//! Audio capture engine.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};

use zoomcast_common::{join_with_timeout, DriftMeasurement, SessionAnchor};
use zoomcast_common::{ZoomcastError, ZoomcastResult};
use zoomcast_session_model::AudioMode;

use crate::backend::{select_microphone, AudioBackend, BlockStream, DeviceInfo};
use crate::consolidator::{run_consolidator, samples_to_le_bytes, CapturedTracks, TrackMessage};
use crate::drift::DriftCompensator;
use crate::mixdown::{effective_mode, mixdown};
use crate::settings::AudioSettings;
use crate::wav::write_wav;

/// How long a producer sleeps on the anchor between device drains.
const ANCHOR_WAIT_SLICE: Duration = Duration::from_millis(20);

/// Runs the loopback and microphone capture threads for one session.
pub struct AudioCaptureEngine {
    backend: Arc<dyn AudioBackend>,
    anchor: Arc<SessionAnchor>,
    settings: AudioSettings,
    effective_mode: AudioMode,
    output_path: Option<PathBuf>,
    running: Option<RunningCapture>,
}

struct RunningCapture {
    stop_flag: Arc<AtomicBool>,
    producers: Vec<(&'static str, JoinHandle<()>)>,
    consolidator: JoinHandle<CapturedTracks>,
    control: Sender<TrackMessage>,
}

/// What a producer thread needs besides its stream.
struct ProducerContext {
    anchor: Arc<SessionAnchor>,
    stop_flag: Arc<AtomicBool>,
    tx: Sender<TrackMessage>,
    read_timeout: Duration,
}

impl AudioCaptureEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, anchor: Arc<SessionAnchor>) -> Self {
        Self {
            backend,
            anchor,
            settings: AudioSettings::default(),
            effective_mode: AudioMode::None,
            output_path: None,
            running: None,
        }
    }

    /// Set mode, format and gains for the next capture.
    pub fn configure(&mut self, settings: AudioSettings) -> ZoomcastResult<()> {
        if self.running.is_some() {
            return Err(ZoomcastError::audio("cannot reconfigure while capturing"));
        }
        tracing::debug!(
            mode = %settings.mode,
            sample_rate = settings.sample_rate,
            channels = settings.channels,
            system_gain = settings.system_gain,
            mic_gain = settings.mic_gain,
            "Audio engine configured"
        );
        self.settings = settings;
        Ok(())
    }

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    /// Mode in effect after `start_capture` (may be downgraded).
    pub fn effective_mode(&self) -> AudioMode {
        self.effective_mode
    }

    pub fn is_capturing(&self) -> bool {
        self.running.is_some()
    }

    /// Start the capture threads. Audio is written to `output_path` on stop.
    ///
    /// Returns the mode actually in effect: an unavailable backend
    /// downgrades to [`AudioMode::None`]. A required microphone with no
    /// input device is an error; the caller decides whether to continue
    /// without audio.
    pub fn start_capture(&mut self, output_path: &Path) -> ZoomcastResult<AudioMode> {
        if self.running.is_some() {
            return Err(ZoomcastError::audio("audio capture already running"));
        }
        self.output_path = Some(output_path.to_path_buf());
        self.effective_mode = AudioMode::None;

        let mode = self.settings.mode;
        if mode == AudioMode::None {
            return Ok(AudioMode::None);
        }

        if !self.backend.is_available() {
            tracing::warn!(
                backend = self.backend.name(),
                requested = %mode,
                "Audio backend unavailable, recording without audio"
            );
            return Ok(AudioMode::None);
        }

        let microphone = if mode.wants_microphone() {
            Some(self.pick_microphone()?)
        } else {
            None
        };

        let stop_flag = Arc::new(AtomicBool::new(false));
        let (tx, rx) = unbounded();

        let consolidator = std::thread::Builder::new()
            .name("audio-consolidator".into())
            .spawn(move || run_consolidator(rx))?;

        let mut producers = Vec::new();

        if mode.wants_system() {
            let ctx = self.producer_context(&stop_flag, &tx);
            let backend = Arc::clone(&self.backend);
            let handle = std::thread::Builder::new()
                .name("audio-system".into())
                .spawn(move || run_system_producer(backend, ctx))?;
            producers.push(("audio-system", handle));
        }

        if let Some(device) = microphone {
            let ctx = self.producer_context(&stop_flag, &tx);
            let backend = Arc::clone(&self.backend);
            let rate = self.settings.sample_rate;
            let handle = std::thread::Builder::new()
                .name("audio-mic".into())
                .spawn(move || run_mic_producer(backend, device, rate, ctx))?;
            producers.push(("audio-mic", handle));
        }

        self.running = Some(RunningCapture {
            stop_flag,
            producers,
            consolidator,
            control: tx,
        });
        self.effective_mode = mode;

        tracing::info!(
            mode = %mode,
            backend = self.backend.name(),
            path = %output_path.display(),
            "Audio capture started"
        );
        Ok(mode)
    }

    fn pick_microphone(&self) -> ZoomcastResult<DeviceInfo> {
        let devices = self.backend.input_devices()?;
        if devices.is_empty() {
            return Err(ZoomcastError::device_not_found("no audio input devices"));
        }
        let device = select_microphone(&devices)
            .cloned()
            .ok_or_else(|| ZoomcastError::device_not_found("no microphone"))?;
        tracing::info!(device = %device.name, "Selected microphone");
        Ok(device)
    }

    fn producer_context(&self, stop_flag: &Arc<AtomicBool>, tx: &Sender<TrackMessage>) -> ProducerContext {
        ProducerContext {
            anchor: Arc::clone(&self.anchor),
            stop_flag: Arc::clone(stop_flag),
            tx: tx.clone(),
            read_timeout: self.settings.read_timeout,
        }
    }

    /// Set the shared anchor. Returns false if it was already set.
    pub fn set_anchor(&self, timestamp: Instant) -> bool {
        self.anchor.set(timestamp)
    }

    /// Stop appending audio until `resume`.
    pub fn pause(&self) -> bool {
        let paused = self.anchor.pause();
        if paused {
            tracing::info!("Audio capture paused");
        }
        paused
    }

    /// Resume appending; the anchor moves forward by the pause length.
    pub fn resume(&self) -> Option<Duration> {
        let paused = self.anchor.resume();
        if let Some(duration) = paused {
            tracing::info!(paused_ms = duration.as_millis() as u64, "Audio capture resumed");
        }
        paused
    }

    /// Flag the capture threads to exit without waiting for them.
    pub fn request_stop(&self) {
        if let Some(running) = &self.running {
            running.stop_flag.store(true, Ordering::SeqCst);
        }
    }

    /// Stop all threads (bounded wait each), mix and write the WAV file.
    ///
    /// Returns the written path, or `None` when nothing was captured.
    pub fn stop_and_save(&mut self) -> ZoomcastResult<Option<PathBuf>> {
        let Some(running) = self.running.take() else {
            return Ok(None);
        };
        let timeout = self.settings.join_timeout;

        running.stop_flag.store(true, Ordering::SeqCst);
        for (name, handle) in running.producers {
            if let Err(e) = join_with_timeout(handle, name, timeout) {
                tracing::warn!(thread = name, error = %e, "Audio producer did not stop cleanly");
            }
        }

        // Producers that timed out still hold senders; Flush ends the
        // consolidator regardless.
        let _ = running.control.send(TrackMessage::Flush);
        drop(running.control);
        let tracks = match join_with_timeout(running.consolidator, "audio-consolidator", timeout) {
            Ok(tracks) => tracks,
            Err(e) => {
                tracing::warn!(error = %e, "Audio consolidator did not finish, audio dropped");
                return Ok(None);
            }
        };

        self.log_drift(&tracks);

        let mode = effective_mode(self.settings.mode, &tracks);
        if mode == AudioMode::None {
            tracing::warn!(requested = %self.settings.mode, "No audio data captured");
            return Ok(None);
        }
        if mode != self.settings.mode {
            tracing::warn!(
                requested = %self.settings.mode,
                mixed = %mode,
                "A requested audio source produced no data"
            );
        }

        let samples = mixdown(&tracks, &self.settings);
        if samples.is_empty() {
            tracing::warn!("Mixdown produced no samples");
            return Ok(None);
        }

        let path = self
            .output_path
            .clone()
            .ok_or_else(|| ZoomcastError::audio("no output path configured"))?;
        write_wav(&path, &samples, self.settings.sample_rate, self.settings.channels)?;
        Ok(Some(path))
    }

    fn log_drift(&self, tracks: &CapturedTracks) {
        let Some(active) = self.anchor.elapsed_active_secs() else {
            return;
        };
        if tracks.has_system() {
            let drift = DriftMeasurement {
                reference_secs: active,
                measured_secs: tracks.system_secs(),
            };
            tracing::info!(drift_ms = drift.drift_ms(), "System audio length vs active time");
        }
        if tracks.has_mic() {
            let drift = DriftMeasurement {
                reference_secs: active,
                measured_secs: tracks.mic_secs(),
            };
            tracing::info!(drift_ms = drift.drift_ms(), "Microphone length vs active time");
        }
    }
}

impl Drop for AudioCaptureEngine {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.stop_flag.store(true, Ordering::SeqCst);
            let _ = running.control.send(TrackMessage::Flush);
        }
    }
}

/// Block on the session anchor, draining and dropping whatever the device
/// delivers meanwhile. Returns the number of dropped blocks, or `None` if
/// the engine stopped or the device failed first.
fn await_anchor(stream: &mut dyn BlockStream, ctx: &ProducerContext, track: &str) -> Option<usize> {
    let mut discarded = 0usize;
    loop {
        let anchored = ctx.anchor.wait(ANCHOR_WAIT_SLICE);
        loop {
            match stream.read_block(Duration::ZERO) {
                Ok(Some(_)) => discarded += 1,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(track, error = %e, "Audio read failed before the session started");
                    return None;
                }
            }
        }
        if anchored {
            tracing::debug!(track, discarded, "Audio producer anchored");
            return Some(discarded);
        }
        if ctx.stop_flag.load(Ordering::Relaxed) {
            return None;
        }
    }
}

/// System-loopback thread: wait for the anchor, drop blocks while paused,
/// inject silence for gaps, forward the rest.
fn run_system_producer(backend: Arc<dyn AudioBackend>, ctx: ProducerContext) {
    let mut stream = match backend.open_loopback() {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "System audio unavailable, continuing without it");
            return;
        }
    };
    let format = stream.format();
    let _ = ctx.tx.send(TrackMessage::SystemFormat(format));
    let mut drift = DriftCompensator::new(format.sample_rate, format.channels);
    let Some(mut discarded) = await_anchor(stream.as_mut(), &ctx, "system") else {
        return;
    };

    while !ctx.stop_flag.load(Ordering::Relaxed) {
        let block = match stream.read_block(ctx.read_timeout) {
            Ok(Some(block)) => block,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "System audio read failed, stopping system capture");
                break;
            }
        };

        if ctx.anchor.is_paused() {
            discarded += 1;
            continue;
        }
        let Some(elapsed) = ctx.anchor.elapsed_active_secs() else {
            continue;
        };

        let bytes = samples_to_le_bytes(&block);
        let silence = drift.compensate(elapsed, bytes.len());
        if silence > 0 {
            tracing::debug!(
                silence_ms = silence as f64 * 1000.0
                    / (format.sample_rate as f64 * drift.frame_bytes() as f64),
                "Filling loopback gap with silence"
            );
            if ctx.tx.send(TrackMessage::System(vec![0u8; silence])).is_err() {
                break;
            }
        }
        if ctx.tx.send(TrackMessage::System(bytes)).is_err() {
            break;
        }
    }

    tracing::debug!(
        total_bytes = drift.total_bytes(),
        injected_bytes = drift.injected_bytes(),
        discarded_blocks = discarded,
        "System audio thread exiting"
    );
}

/// Microphone thread: mono blocks, forwarded once anchored and while not
/// paused.
fn run_mic_producer(
    backend: Arc<dyn AudioBackend>,
    device: DeviceInfo,
    preferred_rate: u32,
    ctx: ProducerContext,
) {
    let mut stream = match backend.open_microphone(&device, preferred_rate) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(device = %device.name, error = %e, "Microphone unavailable, continuing without it");
            return;
        }
    };
    let _ = ctx.tx.send(TrackMessage::MicFormat(stream.format()));
    if await_anchor(stream.as_mut(), &ctx, "microphone").is_none() {
        return;
    }

    while !ctx.stop_flag.load(Ordering::Relaxed) {
        let block = match stream.read_block(ctx.read_timeout) {
            Ok(Some(block)) => block,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "Microphone read failed, stopping microphone capture");
                break;
            }
        };
        if ctx.anchor.is_paused() {
            continue;
        }
        if ctx.tx.send(TrackMessage::Mic(block)).is_err() {
            break;
        }
    }
    tracing::debug!("Microphone thread exiting");
}
