//! Per-session audio configuration.

use std::time::Duration;

use zoomcast_common::{RecordingDefaults, ZoomcastError, ZoomcastResult};
use zoomcast_session_model::AudioMode;

/// Upper bound for either track gain.
pub const MAX_GAIN: f32 = 3.0;

/// Frames per block requested from capture devices.
pub const DEFAULT_BLOCK_FRAMES: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    pub mode: AudioMode,
    /// Output sample rate.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
    pub system_gain: f32,
    pub mic_gain: f32,
    /// How long a producer waits on a device read before re-checking flags.
    pub read_timeout: Duration,
    /// Bounded join for each capture thread on stop.
    pub join_timeout: Duration,
}

impl AudioSettings {
    /// Validate rate and channel count, clamping gains into `[0, MAX_GAIN]`.
    pub fn new(
        mode: AudioMode,
        sample_rate: u32,
        channels: u16,
        system_gain: f32,
        mic_gain: f32,
    ) -> ZoomcastResult<Self> {
        if sample_rate == 0 {
            return Err(ZoomcastError::config("audio sample rate must be positive"));
        }
        if channels == 0 {
            return Err(ZoomcastError::config("audio channel count must be positive"));
        }
        Ok(Self {
            mode,
            sample_rate,
            channels,
            system_gain: clamp_gain(system_gain),
            mic_gain: clamp_gain(mic_gain),
            read_timeout: Duration::from_millis(100),
            join_timeout: Duration::from_secs(2),
        })
    }

    pub fn from_defaults(defaults: &RecordingDefaults) -> ZoomcastResult<Self> {
        let mode = defaults
            .audio_mode
            .parse::<AudioMode>()
            .map_err(ZoomcastError::config)?;
        let mut settings = Self::new(
            mode,
            defaults.audio_sample_rate,
            defaults.audio_channels,
            defaults.system_gain,
            defaults.mic_gain,
        )?;
        settings.join_timeout = Duration::from_millis(defaults.join_timeout_ms);
        Ok(settings)
    }

    /// Bytes per interleaved 16-bit frame at the output channel count.
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * 2
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            mode: AudioMode::None,
            sample_rate: 48000,
            channels: 2,
            system_gain: 1.0,
            mic_gain: 2.0,
            read_timeout: Duration::from_millis(100),
            join_timeout: Duration::from_secs(2),
        }
    }
}

fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        1.0
    } else {
        gain.clamp(0.0, MAX_GAIN)
    }
}
