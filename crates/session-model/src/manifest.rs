//! Per-recording manifest.
//!
//! Written next to the intermediate files when a session stops, so the
//! post-processing step can run later (or again) without the live session.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use zoomcast_common::{ZoomcastError, ZoomcastResult};

use crate::region::CaptureRegion;
use crate::settings::AudioMode;

pub const MANIFEST_SCHEMA_VERSION: &str = "1.0";

/// How raw video frames map onto the event timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoTimeline {
    /// Frame `i` sits at `i / fps` on the event timeline; frames inside
    /// pause intervals are cut.
    #[default]
    Continuous,
    /// Paused spans were never written. Frame `i` is at active time
    /// `i / fps`, which is mapped onto the event timeline by adding the
    /// preceding pause durations. Nothing is cut.
    ActiveOnly,
}

/// Where the zoom effect is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EffectPass {
    /// Raw frames are recorded; the effect is reconstructed afterwards.
    #[default]
    Offline,
    /// Frames are zoomed while recording; only muxing remains.
    Live,
}

/// Everything a later processing step needs to know about a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub schema_version: String,
    pub name: String,
    /// RFC 3339 wall time of the session anchor.
    #[serde(default)]
    pub started_at: Option<String>,
    pub raw_video: PathBuf,
    #[serde(default)]
    pub audio: Option<PathBuf>,
    pub events: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    #[serde(default)]
    pub region: Option<CaptureRegion>,
    #[serde(default)]
    pub timeline: VideoTimeline,
    #[serde(default)]
    pub effect_pass: EffectPass,
    #[serde(default)]
    pub audio_mode: AudioMode,
    #[serde(default)]
    pub frames_written: u64,
    #[serde(default)]
    pub active_secs: f64,
    #[serde(default)]
    pub paused_secs: f64,
}

impl SessionManifest {
    /// Conventional manifest location for a recording called `name`.
    pub fn path_for(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}_session.json"))
    }

    pub fn save(&self, path: &Path) -> ZoomcastResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "Session manifest saved");
        Ok(())
    }

    pub fn load(path: &Path) -> ZoomcastResult<Self> {
        if !path.exists() {
            return Err(ZoomcastError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let manifest: Self = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        if manifest.schema_version != MANIFEST_SCHEMA_VERSION {
            tracing::warn!(
                found = %manifest.schema_version,
                expected = MANIFEST_SCHEMA_VERSION,
                "Session manifest schema version differs"
            );
        }
        Ok(manifest)
    }
}
