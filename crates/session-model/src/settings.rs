//! Session-level output settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which audio sources a session captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    #[default]
    None,
    System,
    Microphone,
    Both,
}

impl AudioMode {
    pub fn wants_system(&self) -> bool {
        matches!(self, Self::System | Self::Both)
    }

    pub fn wants_microphone(&self) -> bool {
        matches!(self, Self::Microphone | Self::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::System => "system",
            Self::Microphone => "microphone",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for AudioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "system" => Ok(Self::System),
            "microphone" | "mic" => Ok(Self::Microphone),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown audio mode '{other}' (expected none, system, microphone, both)"
            )),
        }
    }
}

/// Output quality tier.
///
/// Higher tiers compress less. Each maps to a constant-quality encoder
/// parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [Self::Low, Self::Medium, Self::High];

    /// libx264 constant rate factor (lower is higher quality).
    pub fn crf(&self) -> u8 {
        match self {
            Self::Low => 28,
            Self::Medium => 23,
            Self::High => 18,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!(
                "unknown quality '{other}' (expected low, medium, high)"
            )),
        }
    }
}
