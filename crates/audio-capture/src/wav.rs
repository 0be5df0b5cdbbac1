//! 16-bit PCM WAV output.

use std::path::Path;

use zoomcast_common::{ZoomcastError, ZoomcastResult};

fn wav_error(path: &Path, err: hound::Error) -> ZoomcastError {
    ZoomcastError::audio(format!("WAV I/O failed for {}: {err}", path.display()))
}

/// Write interleaved samples to `path`.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> ZoomcastResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| wav_error(path, e))?;
    for &sample in samples {
        writer.write_sample(sample).map_err(|e| wav_error(path, e))?;
    }
    writer.finalize().map_err(|e| wav_error(path, e))?;

    tracing::info!(
        path = %path.display(),
        sample_rate,
        channels,
        secs = samples.len() as f64 / (sample_rate as f64 * channels.max(1) as f64),
        "Audio written"
    );
    Ok(())
}

/// Read a 16-bit WAV file into `(samples, sample_rate, channels)`.
pub fn read_wav(path: &Path) -> ZoomcastResult<(Vec<i16>, u32, u16)> {
    let mut reader = hound::WavReader::open(path).map_err(|e| wav_error(path, e))?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(ZoomcastError::unsupported(format!(
            "{} is not 16-bit integer PCM",
            path.display()
        )));
    }
    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| wav_error(path, e))?;
    Ok((samples, spec.sample_rate, spec.channels))
}
