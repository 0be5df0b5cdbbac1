//! Drift compensation for loopback capture.
//!
//! Loopback devices deliver nothing while the system is silent, so the
//! byte count of the system track falls behind the wall clock. Before each
//! real block is appended, the compensator compares the track length with
//! what the elapsed active time implies and, once the deficit exceeds the
//! tolerance, emits zero bytes to close it.

/// Deficit (seconds) tolerated before silence is injected.
pub const DRIFT_TOLERANCE_SECS: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct DriftCompensator {
    sample_rate: u32,
    frame_bytes: usize,
    tolerance_bytes: usize,
    total_bytes: usize,
    injected_bytes: usize,
}

impl DriftCompensator {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self::with_tolerance(sample_rate, channels, DRIFT_TOLERANCE_SECS)
    }

    pub fn with_tolerance(sample_rate: u32, channels: u16, tolerance_secs: f64) -> Self {
        let frame_bytes = channels.max(1) as usize * 2;
        Self {
            sample_rate,
            frame_bytes,
            tolerance_bytes: (sample_rate as f64 * frame_bytes as f64 * tolerance_secs) as usize,
            total_bytes: 0,
            injected_bytes: 0,
        }
    }

    /// Expected track length after `elapsed_secs` of active time, rounded
    /// down to a whole frame.
    pub fn expected_bytes(&self, elapsed_secs: f64) -> usize {
        let raw = (elapsed_secs.max(0.0) * self.sample_rate as f64 * self.frame_bytes as f64)
            as usize;
        raw - raw % self.frame_bytes
    }

    /// Account for a block of `block_len` bytes read at `elapsed_secs`.
    ///
    /// Returns how many zero bytes to append before the block. Both the
    /// silence and the block are added to the running total.
    pub fn compensate(&mut self, elapsed_secs: f64, block_len: usize) -> usize {
        let expected = self.expected_bytes(elapsed_secs);
        let after_block = self.total_bytes + block_len;
        let silence = if expected > after_block + self.tolerance_bytes {
            expected - after_block
        } else {
            0
        };
        self.total_bytes += silence + block_len;
        self.injected_bytes += silence;
        silence
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn injected_bytes(&self) -> usize {
        self.injected_bytes
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Track duration in seconds.
    pub fn total_secs(&self) -> f64 {
        self.total_bytes as f64 / (self.sample_rate as f64 * self.frame_bytes as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 48000;
    const BLOCK_FRAMES: usize = 1024;

    #[test]
    fn test_expected_bytes_frame_aligned() {
        let drift = DriftCompensator::new(RATE, 2);
        assert_eq!(drift.expected_bytes(1.0), 192_000);
        assert_eq!(drift.expected_bytes(0.00001) % 4, 0);
        assert_eq!(drift.expected_bytes(-1.0), 0);
    }

    #[test]
    fn test_steady_feed_injects_nothing() {
        let mut drift = DriftCompensator::new(RATE, 2);
        let block_bytes = BLOCK_FRAMES * 4;
        let block_secs = BLOCK_FRAMES as f64 / RATE as f64;
        for i in 1..=500 {
            assert_eq!(drift.compensate(i as f64 * block_secs, block_bytes), 0);
        }
        assert_eq!(drift.injected_bytes(), 0);
    }

    #[test]
    fn test_small_gap_within_tolerance() {
        let mut drift = DriftCompensator::new(RATE, 2);
        drift.compensate(0.0, 4096);
        // 50ms behind: below the 100ms tolerance.
        assert_eq!(drift.compensate(0.05 + 4096.0 / 192_000.0, 4096), 0);
    }

    #[test]
    fn test_withheld_300ms_resyncs_within_one_frame() {
        let mut drift = DriftCompensator::new(RATE, 2);
        let block_bytes = BLOCK_FRAMES * 4;
        let block_secs = BLOCK_FRAMES as f64 / RATE as f64;

        let mut clock = 0.0;
        for _ in 0..50 {
            clock += block_secs;
            drift.compensate(clock, block_bytes);
        }

        // Device goes silent for exactly 0.3s, then the next block arrives.
        clock += 0.3 + block_secs;
        let silence = drift.compensate(clock, block_bytes);

        assert!(silence > 0);
        assert_eq!(silence % drift.frame_bytes(), 0);
        let expected = drift.expected_bytes(clock);
        let diff = drift.total_bytes().abs_diff(expected);
        assert!(diff <= drift.frame_bytes(), "off by {diff} bytes");
        // The injected span is the withheld 0.3s, up to rounding.
        let injected_secs = silence as f64 / 192_000.0;
        assert!((injected_secs - 0.3).abs() <= 2.0 / RATE as f64);
    }

    #[test]
    fn test_mono_frame_size() {
        let mut drift = DriftCompensator::new(44100, 1);
        assert_eq!(drift.frame_bytes(), 2);
        let silence = drift.compensate(1.0, 0);
        assert_eq!(silence, 88_200);
        assert!((drift.total_secs() - 1.0).abs() < 1e-9);
    }
}
