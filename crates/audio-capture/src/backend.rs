//! Audio backend abstraction and device selection.

use std::time::Duration;

use zoomcast_common::ZoomcastResult;

/// Sample rate and channel layout of a capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Bytes per interleaved 16-bit frame.
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * 2
    }
}

/// An enumerated input device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    pub channels: u16,
    pub default_sample_rate: u32,
    /// Whether the host reports this as its default input.
    pub is_default: bool,
}

/// A running capture stream delivering interleaved 16-bit blocks.
///
/// Streams are opened and read on the capture thread that owns them and
/// need not be `Send`.
pub trait BlockStream {
    fn format(&self) -> StreamFormat;

    /// Next block, or `Ok(None)` if nothing arrived within `timeout`.
    ///
    /// An error means the device went away; the reader should stop.
    fn read_block(&mut self, timeout: Duration) -> ZoomcastResult<Option<Vec<i16>>>;
}

/// Platform audio access.
pub trait AudioBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Whether the backend can be used on this system at all.
    fn is_available(&self) -> bool;

    /// Enumerate input (recording) devices.
    fn input_devices(&self) -> ZoomcastResult<Vec<DeviceInfo>>;

    /// Open the system-loopback source at its native format.
    fn open_loopback(&self) -> ZoomcastResult<Box<dyn BlockStream>>;

    /// Open `device` as a mono stream, preferring `preferred_rate`.
    fn open_microphone(
        &self,
        device: &DeviceInfo,
        preferred_rate: u32,
    ) -> ZoomcastResult<Box<dyn BlockStream>>;
}

const MICROPHONE_PATTERNS: &[&str] = &["microphone", "mic", "麦克风"];
const LOOPBACK_PATTERNS: &[&str] = &["monitor", "loopback", "stereo mix", "what u hear"];

/// Pick the microphone: a device named like one, else the host default,
/// else the first enumerated input.
pub fn select_microphone(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    devices
        .iter()
        .filter(|d| !is_loopback_name(&d.name))
        .find(|d| name_matches(&d.name, MICROPHONE_PATTERNS))
        .or_else(|| devices.iter().find(|d| d.is_default))
        .or_else(|| devices.first())
}

/// First input device that looks like a loopback/monitor source.
pub fn select_loopback(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    devices.iter().find(|d| is_loopback_name(&d.name))
}

pub fn is_loopback_name(name: &str) -> bool {
    name_matches(name, LOOPBACK_PATTERNS)
}

fn name_matches(name: &str, patterns: &[&str]) -> bool {
    let lower = name.to_lowercase();
    patterns.iter().any(|p| lower.contains(p))
}

/// Convert a float sample in `[-1, 1]` to 16-bit.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, is_default: bool) -> DeviceInfo {
        DeviceInfo {
            name: name.to_string(),
            channels: 1,
            default_sample_rate: 48000,
            is_default,
        }
    }

    #[test]
    fn test_prefers_microphone_name() {
        let devices = vec![
            device("HDMI Audio", true),
            device("USB Microphone", false),
        ];
        assert_eq!(select_microphone(&devices).unwrap().name, "USB Microphone");
    }

    #[test]
    fn test_cjk_microphone_name() {
        let devices = vec![device("Line In", false), device("麦克风 (Realtek)", false)];
        assert_eq!(select_microphone(&devices).unwrap().name, "麦克风 (Realtek)");
    }

    #[test]
    fn test_falls_back_to_default_then_first() {
        let devices = vec![device("Line In", false), device("Webcam", true)];
        assert_eq!(select_microphone(&devices).unwrap().name, "Webcam");

        let devices = vec![device("Line In", false), device("Webcam", false)];
        assert_eq!(select_microphone(&devices).unwrap().name, "Line In");

        assert!(select_microphone(&[]).is_none());
    }

    #[test]
    fn test_monitor_not_chosen_as_mic() {
        let devices = vec![
            device("Monitor of Built-in Audio", false),
            device("Built-in Mic", false),
        ];
        assert_eq!(select_microphone(&devices).unwrap().name, "Built-in Mic");
        assert_eq!(
            select_loopback(&devices).unwrap().name,
            "Monitor of Built-in Audio"
        );
    }

    #[test]
    fn test_f32_conversion() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -i16::MAX);
    }
}
