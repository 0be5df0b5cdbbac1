//! Synthetic audio backend.
//!
//! Generates constant-level blocks in real time, optionally going silent
//! for a while (the way loopback devices do) or failing after a number of
//! blocks. Used for tests and for `--audio-backend synthetic` dry runs.

use std::time::{Duration, Instant};

use zoomcast_common::{ZoomcastError, ZoomcastResult};

use crate::backend::{AudioBackend, BlockStream, DeviceInfo, StreamFormat};

/// Script for one synthetic stream.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub format: StreamFormat,
    pub block_frames: usize,
    pub level: i16,
    /// `(after_blocks, gap)`: deliver nothing for `gap` once `after_blocks`
    /// blocks have been produced.
    pub gap: Option<(usize, Duration)>,
    /// Fail reads once this many blocks have been produced.
    pub fail_after: Option<usize>,
}

impl SyntheticSource {
    pub fn new(format: StreamFormat, level: i16) -> Self {
        Self {
            format,
            block_frames: 480,
            level,
            gap: None,
            fail_after: None,
        }
    }

    pub fn with_gap(mut self, after_blocks: usize, gap: Duration) -> Self {
        self.gap = Some((after_blocks, gap));
        self
    }

    pub fn failing_after(mut self, blocks: usize) -> Self {
        self.fail_after = Some(blocks);
        self
    }

    fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_frames as f64 / self.format.sample_rate.max(1) as f64)
    }
}

/// Backend serving scripted loopback and microphone streams.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    pub available: bool,
    pub devices: Vec<DeviceInfo>,
    pub loopback: Option<SyntheticSource>,
    pub microphone: Option<SyntheticSource>,
}

impl SyntheticBackend {
    /// Loopback at 48 kHz stereo and a 44.1 kHz microphone, both present.
    pub fn standard() -> Self {
        Self {
            available: true,
            devices: vec![DeviceInfo {
                name: "Synthetic Microphone".to_string(),
                channels: 1,
                default_sample_rate: 44100,
                is_default: true,
            }],
            loopback: Some(SyntheticSource::new(StreamFormat::new(48000, 2), 1000)),
            microphone: Some(SyntheticSource::new(StreamFormat::new(44100, 1), 2000)),
        }
    }

    /// A backend that reports itself unavailable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            devices: Vec::new(),
            loopback: None,
            microphone: None,
        }
    }
}

impl AudioBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn input_devices(&self) -> ZoomcastResult<Vec<DeviceInfo>> {
        Ok(self.devices.clone())
    }

    fn open_loopback(&self) -> ZoomcastResult<Box<dyn BlockStream>> {
        let source = self
            .loopback
            .clone()
            .ok_or_else(|| ZoomcastError::device_not_found("no synthetic loopback source"))?;
        Ok(Box::new(SyntheticStream::new(source)))
    }

    fn open_microphone(
        &self,
        _device: &DeviceInfo,
        _preferred_rate: u32,
    ) -> ZoomcastResult<Box<dyn BlockStream>> {
        let source = self
            .microphone
            .clone()
            .ok_or_else(|| ZoomcastError::device_not_found("no synthetic microphone"))?;
        Ok(Box::new(SyntheticStream::new(source)))
    }
}

struct SyntheticStream {
    source: SyntheticSource,
    started: Instant,
    produced: usize,
}

impl SyntheticStream {
    fn new(source: SyntheticSource) -> Self {
        Self {
            source,
            started: Instant::now(),
            produced: 0,
        }
    }

    fn next_due(&self) -> Instant {
        let mut due = self.started + self.source.block_duration() * (self.produced as u32 + 1);
        if let Some((after, gap)) = self.source.gap {
            if self.produced >= after {
                due += gap;
            }
        }
        due
    }
}

impl BlockStream for SyntheticStream {
    fn format(&self) -> StreamFormat {
        self.source.format
    }

    fn read_block(&mut self, timeout: Duration) -> ZoomcastResult<Option<Vec<i16>>> {
        if let Some(limit) = self.source.fail_after {
            if self.produced >= limit {
                return Err(ZoomcastError::stream_read("synthetic device disconnected"));
            }
        }

        let due = self.next_due();
        let now = Instant::now();
        if due > now {
            let wait = due - now;
            if wait > timeout {
                std::thread::sleep(timeout);
                return Ok(None);
            }
            std::thread::sleep(wait);
        }

        self.produced += 1;
        let len = self.source.block_frames * self.source.format.channels as usize;
        Ok(Some(vec![self.source.level; len]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_have_format_size() {
        let backend = SyntheticBackend::standard();
        let mut stream = backend.open_loopback().unwrap();
        let block = stream
            .read_block(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        assert_eq!(block.len(), 480 * 2);
        assert!(block.iter().all(|&s| s == 1000));
    }

    #[test]
    fn test_gap_yields_timeouts() {
        let source = SyntheticSource::new(StreamFormat::new(48000, 1), 1)
            .with_gap(0, Duration::from_millis(200));
        let mut stream = SyntheticStream::new(source);
        assert!(stream.read_block(Duration::from_millis(20)).unwrap().is_none());
    }

    #[test]
    fn test_failure_after_limit() {
        let source = SyntheticSource::new(StreamFormat::new(48000, 1), 1).failing_after(1);
        let mut stream = SyntheticStream::new(source);
        assert!(stream.read_block(Duration::from_millis(100)).unwrap().is_some());
        assert!(stream.read_block(Duration::from_millis(100)).is_err());
    }
}
