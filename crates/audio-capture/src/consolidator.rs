//! Single owner of the captured track buffers.
//!
//! Producers never touch the buffers. They send [`TrackMessage`]s and the
//! consolidator appends them in arrival order until it sees `Flush` (or
//! every sender is gone), then hands the tracks over by value.

use crossbeam_channel::Receiver;

use crate::backend::StreamFormat;

#[derive(Debug)]
pub enum TrackMessage {
    SystemFormat(StreamFormat),
    /// Interleaved little-endian 16-bit PCM.
    System(Vec<u8>),
    MicFormat(StreamFormat),
    /// Mono 16-bit samples.
    Mic(Vec<i16>),
    Flush,
}

/// Everything captured during a session, in device formats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedTracks {
    pub system: Vec<u8>,
    pub system_format: Option<StreamFormat>,
    pub mic: Vec<i16>,
    pub mic_format: Option<StreamFormat>,
}

impl CapturedTracks {
    pub fn has_system(&self) -> bool {
        !self.system.is_empty() && self.system_format.is_some()
    }

    pub fn has_mic(&self) -> bool {
        !self.mic.is_empty() && self.mic_format.is_some()
    }

    /// System track decoded to samples. A trailing odd byte is dropped.
    pub fn system_samples(&self) -> Vec<i16> {
        self.system
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    pub fn system_secs(&self) -> f64 {
        match self.system_format {
            Some(format) if format.sample_rate > 0 => {
                self.system.len() as f64 / (format.sample_rate as f64 * format.frame_bytes() as f64)
            }
            _ => 0.0,
        }
    }

    pub fn mic_secs(&self) -> f64 {
        match self.mic_format {
            Some(format) if format.sample_rate > 0 => {
                self.mic.len() as f64 / format.sample_rate as f64
            }
            _ => 0.0,
        }
    }
}

/// Encode samples as little-endian PCM bytes.
pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Consolidator thread body.
pub fn run_consolidator(rx: Receiver<TrackMessage>) -> CapturedTracks {
    let mut tracks = CapturedTracks::default();
    let mut chunks = 0usize;

    for message in rx.iter() {
        match message {
            TrackMessage::SystemFormat(format) => tracks.system_format = Some(format),
            TrackMessage::System(bytes) => {
                tracks.system.extend_from_slice(&bytes);
                chunks += 1;
            }
            TrackMessage::MicFormat(format) => tracks.mic_format = Some(format),
            TrackMessage::Mic(samples) => {
                tracks.mic.extend_from_slice(&samples);
                chunks += 1;
            }
            TrackMessage::Flush => break,
        }
    }

    tracing::debug!(
        chunks,
        system_bytes = tracks.system.len(),
        mic_samples = tracks.mic.len(),
        "Audio consolidator flushed"
    );
    tracks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_appends_in_arrival_order() {
        let (tx, rx) = unbounded();
        tx.send(TrackMessage::SystemFormat(StreamFormat::new(48000, 2)))
            .unwrap();
        tx.send(TrackMessage::System(samples_to_le_bytes(&[1, 2])))
            .unwrap();
        tx.send(TrackMessage::System(samples_to_le_bytes(&[3, 4])))
            .unwrap();
        tx.send(TrackMessage::Mic(vec![7])).unwrap();
        tx.send(TrackMessage::Flush).unwrap();
        // Ignored after flush.
        tx.send(TrackMessage::Mic(vec![8])).unwrap();

        let tracks = run_consolidator(rx);
        assert_eq!(tracks.system_samples(), vec![1, 2, 3, 4]);
        assert_eq!(tracks.mic, vec![7]);
        assert!(tracks.has_system());
        assert!(!tracks.has_mic());
    }

    #[test]
    fn test_ends_when_senders_dropped() {
        let (tx, rx) = unbounded();
        tx.send(TrackMessage::Mic(vec![1, 2, 3])).unwrap();
        drop(tx);
        assert_eq!(run_consolidator(rx).mic.len(), 3);
    }

    #[test]
    fn test_durations() {
        let tracks = CapturedTracks {
            system: vec![0; 192_000],
            system_format: Some(StreamFormat::new(48000, 2)),
            mic: vec![0; 22050],
            mic_format: Some(StreamFormat::new(44100, 1)),
        };
        assert!((tracks.system_secs() - 1.0).abs() < 1e-9);
        assert!((tracks.mic_secs() - 0.5).abs() < 1e-9);
    }
}
