//! Mixdown of the captured tracks into one 16-bit stream.
//!
//! Gain is applied in floating point and the result clamped to the 16-bit
//! range before rounding back to an integer sample. Tracks whose device
//! format differs from the session format are channel-mapped and then
//! linearly resampled first. In combined mode the shorter track is padded
//! with zeros and the two are averaged.

use zoomcast_session_model::AudioMode;

use crate::backend::StreamFormat;
use crate::consolidator::CapturedTracks;
use crate::settings::AudioSettings;

/// Round and clamp to 16 bits.
pub fn quantize(value: f64) -> i16 {
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// `clamp(round(sample * gain))` for every sample.
pub fn apply_gain(samples: &[i16], gain: f32) -> Vec<i16> {
    let gain = gain as f64;
    samples.iter().map(|&s| quantize(s as f64 * gain)).collect()
}

/// Linear-interpolation resampler over interleaved frames.
///
/// The output holds `floor(frames * to / from)` frames.
pub fn resample_linear(interleaved: &[f32], channels: usize, from: u32, to: u32) -> Vec<f32> {
    if from == to || interleaved.is_empty() || channels == 0 || from == 0 {
        return interleaved.to_vec();
    }
    let frames_in = interleaved.len() / channels;
    let frames_out = (frames_in as u64 * to as u64 / from as u64) as usize;
    let step = from as f64 / to as f64;

    let mut out = Vec::with_capacity(frames_out * channels);
    for i in 0..frames_out {
        let position = i as f64 * step;
        let index = (position as usize).min(frames_in - 1);
        let next = (index + 1).min(frames_in - 1);
        let fraction = (position - index as f64) as f32;
        for ch in 0..channels {
            let a = interleaved[index * channels + ch];
            let b = interleaved[next * channels + ch];
            out.push(a + (b - a) * fraction);
        }
    }
    out
}

/// Convert between channel counts: mono is duplicated, a wider source is
/// averaged down to mono first.
pub fn remap_channels(interleaved: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return interleaved.to_vec();
    }
    let mono: Vec<f32> = if from == 1 {
        interleaved.to_vec()
    } else {
        interleaved
            .chunks_exact(from)
            .map(|frame| frame.iter().sum::<f32>() / from as f32)
            .collect()
    };
    expand_mono(&mono, to)
}

/// Duplicate each mono sample across `channels`.
pub fn expand_mono<T: Copy>(mono: &[T], channels: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(mono.len() * channels);
    for &sample in mono {
        for _ in 0..channels {
            out.push(sample);
        }
    }
    out
}

/// Average two tracks sample by sample, zero-padding the shorter one.
pub fn mix_pair(system: &[f32], mic: &[f32]) -> Vec<f32> {
    let len = system.len().max(mic.len());
    (0..len)
        .map(|i| {
            let s = system.get(i).copied().unwrap_or(0.0);
            let m = mic.get(i).copied().unwrap_or(0.0);
            (s + m) / 2.0
        })
        .collect()
}

/// Bring a device-format track to the session format, ungained.
fn conform(samples: &[i16], format: StreamFormat, target: StreamFormat) -> Vec<f32> {
    let floats: Vec<f32> = samples.iter().map(|&s| s as f32).collect();
    let remapped = remap_channels(&floats, format.channels as usize, target.channels as usize);
    resample_linear(
        &remapped,
        target.channels as usize,
        format.sample_rate,
        target.sample_rate,
    )
}

/// Which mode the mixdown actually uses, given what was captured.
///
/// A requested source that produced nothing is dropped rather than mixed
/// in as silence.
pub fn effective_mode(requested: AudioMode, tracks: &CapturedTracks) -> AudioMode {
    let system = requested.wants_system() && tracks.has_system();
    let mic = requested.wants_microphone() && tracks.has_mic();
    match (system, mic) {
        (true, true) => AudioMode::Both,
        (true, false) => AudioMode::System,
        (false, true) => AudioMode::Microphone,
        (false, false) => AudioMode::None,
    }
}

/// Mix the captured tracks into interleaved samples at the session format.
pub fn mixdown(tracks: &CapturedTracks, settings: &AudioSettings) -> Vec<i16> {
    let target = StreamFormat::new(settings.sample_rate, settings.channels);
    let channels = settings.channels as usize;

    match effective_mode(settings.mode, tracks) {
        AudioMode::None => Vec::new(),
        AudioMode::System => {
            let Some(format) = tracks.system_format else {
                return Vec::new();
            };
            let samples = tracks.system_samples();
            if format == target {
                apply_gain(&samples, settings.system_gain)
            } else {
                gain_and_quantize(&conform(&samples, format, target), settings.system_gain)
            }
        }
        AudioMode::Microphone => {
            let Some(format) = tracks.mic_format else {
                return Vec::new();
            };
            let mono = if format.sample_rate == target.sample_rate {
                apply_gain(&tracks.mic, settings.mic_gain)
            } else {
                let mono_target = StreamFormat::new(target.sample_rate, 1);
                gain_and_quantize(&conform(&tracks.mic, format, mono_target), settings.mic_gain)
            };
            expand_mono(&mono, channels)
        }
        AudioMode::Both => {
            let (Some(system_format), Some(mic_format)) = (tracks.system_format, tracks.mic_format)
            else {
                return Vec::new();
            };
            let system = conform(&tracks.system_samples(), system_format, target);
            let mic_mono = conform(
                &tracks.mic,
                mic_format,
                StreamFormat::new(target.sample_rate, 1),
            );
            let mic = expand_mono(&mic_mono, channels);

            let system = scale(&system, settings.system_gain);
            let mic = scale(&mic, settings.mic_gain);
            mix_pair(&system, &mic)
                .into_iter()
                .map(|v| quantize(v as f64))
                .collect()
        }
    }
}

fn scale(samples: &[f32], gain: f32) -> Vec<f32> {
    samples.iter().map(|&s| s * gain).collect()
}

fn gain_and_quantize(samples: &[f32], gain: f32) -> Vec<i16> {
    let gain = gain as f64;
    samples.iter().map(|&s| quantize(s as f64 * gain)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidator::samples_to_le_bytes;
    use proptest::prelude::*;

    fn settings(mode: AudioMode, system_gain: f32, mic_gain: f32) -> AudioSettings {
        AudioSettings::new(mode, 48000, 2, system_gain, mic_gain).unwrap()
    }

    #[test]
    fn test_gain_clips() {
        assert_eq!(apply_gain(&[20000, -20000, 100], 2.0), vec![32767, -32768, 200]);
        assert_eq!(apply_gain(&[3], 0.5), vec![2]);
    }

    #[test]
    fn test_resample_length_and_endpoints() {
        let input: Vec<f32> = (0..441).map(|i| i as f32).collect();
        let out = resample_linear(&input, 1, 44100, 48000);
        assert_eq!(out.len(), 480);
        assert_eq!(out[0], 0.0);
        assert!(out.windows(2).all(|w| w[1] >= w[0]));
        assert!(*out.last().unwrap() <= 440.0);
    }

    #[test]
    fn test_resample_keeps_channels_apart() {
        let input = vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let out = resample_linear(&input, 2, 4, 8);
        assert_eq!(out.len(), 16);
        assert!(out.chunks(2).all(|f| f[0] == 1.0 && f[1] == -1.0));
    }

    #[test]
    fn test_remap_channels() {
        assert_eq!(remap_channels(&[1.0, 3.0], 2, 1), vec![2.0]);
        assert_eq!(remap_channels(&[5.0], 1, 2), vec![5.0, 5.0]);
    }

    #[test]
    fn test_mix_pair_pads_shorter() {
        assert_eq!(mix_pair(&[2.0, 4.0, 6.0], &[2.0]), vec![2.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mic_only_expands_to_channels() {
        let tracks = CapturedTracks {
            mic: vec![100, -200],
            mic_format: Some(StreamFormat::new(48000, 1)),
            ..Default::default()
        };
        let out = mixdown(&tracks, &settings(AudioMode::Microphone, 1.0, 2.0));
        assert_eq!(out, vec![200, 200, -400, -400]);
    }

    #[test]
    fn test_both_mode_averages() {
        let tracks = CapturedTracks {
            system: samples_to_le_bytes(&[1000, 1000, 1000, 1000]),
            system_format: Some(StreamFormat::new(48000, 2)),
            mic: vec![3000],
            mic_format: Some(StreamFormat::new(48000, 1)),
        };
        let out = mixdown(&tracks, &settings(AudioMode::Both, 1.0, 1.0));
        assert_eq!(out, vec![2000, 2000, 500, 500]);
    }

    #[test]
    fn test_both_requested_but_only_mic_captured() {
        let tracks = CapturedTracks {
            mic: vec![1000],
            mic_format: Some(StreamFormat::new(48000, 1)),
            ..Default::default()
        };
        assert_eq!(effective_mode(AudioMode::Both, &tracks), AudioMode::Microphone);
        let out = mixdown(&tracks, &settings(AudioMode::Both, 1.0, 1.0));
        assert_eq!(out, vec![1000, 1000]);
    }

    #[test]
    fn test_nothing_captured() {
        let out = mixdown(&CapturedTracks::default(), &settings(AudioMode::Both, 1.0, 1.0));
        assert!(out.is_empty());
    }

    proptest! {
        #[test]
        fn prop_gain_is_clamped_rounded_product(
            samples in proptest::collection::vec(any::<i16>(), 0..512),
            gain in 0.0f32..=3.0,
        ) {
            let tracks = CapturedTracks {
                system: samples_to_le_bytes(&samples),
                system_format: Some(StreamFormat::new(48000, 2)),
                ..Default::default()
            };
            let out = mixdown(&tracks, &settings(AudioMode::System, gain, 1.0));
            prop_assert_eq!(out.len(), samples.len());
            for (input, output) in samples.iter().zip(&out) {
                let expected = (*input as f64 * gain as f64)
                    .round()
                    .clamp(i16::MIN as f64, i16::MAX as f64) as i16;
                prop_assert_eq!(*output, expected);
            }
        }
    }
}
