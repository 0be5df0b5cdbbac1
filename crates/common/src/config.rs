//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where recordings are written.
    pub output_dir: PathBuf,

    /// Default recording settings.
    pub recording: RecordingDefaults,

    /// Default smart-zoom effect parameters.
    pub effects: EffectDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Target capture frame rate.
    pub fps: u32,

    /// Audio mode: "none", "system", "microphone" or "both".
    pub audio_mode: String,

    /// Session audio sample rate.
    pub audio_sample_rate: u32,

    /// Session audio channel count.
    pub audio_channels: u16,

    /// Gain applied to the system-loopback track.
    pub system_gain: f32,

    /// Gain applied to the microphone track.
    pub mic_gain: f32,

    /// Output quality tier: "low", "medium" or "high".
    pub quality: String,

    /// Apply the zoom effect while recording instead of in a later pass.
    pub live_effects: bool,

    /// Bounded wait for each capture thread on stop (milliseconds).
    pub join_timeout_ms: u64,
}

/// Default zoom/pan effect parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectDefaults {
    pub zoom_max: f64,
    pub smoothing: f64,
    pub zoom_duration: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "zoomcast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            recording: RecordingDefaults::default(),
            effects: EffectDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            audio_mode: "none".to_string(),
            audio_sample_rate: 48000,
            audio_channels: 2,
            system_gain: 1.0,
            mic_gain: 2.0,
            quality: "medium".to_string(),
            live_effects: false,
            join_timeout_ms: 2000,
        }
    }
}

impl Default for EffectDefaults {
    fn default() -> Self {
        Self {
            zoom_max: 1.3,
            smoothing: 0.15,
            zoom_duration: 1.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("zoomcast").join("config.json")
}

fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_VIDEOS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join("Videos")
        });
    base.join("zoomcast")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.recording.fps, 30);
        assert_eq!(config.recording.audio_sample_rate, 48000);
        assert_eq!(config.recording.quality, "medium");
        assert!((config.effects.zoom_max - 1.3).abs() < f64::EPSILON);
        assert!((config.recording.mic_gain - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "recording": { "fps": 60, "audio_mode": "both" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.recording.fps, 60);
        assert_eq!(config.recording.audio_mode, "both");
        assert_eq!(config.recording.audio_channels, 2);
        assert!((config.effects.smoothing - 0.15).abs() < f64::EPSILON);
        assert_eq!(config.logging.level, "info");
    }
}
