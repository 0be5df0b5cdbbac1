//! Final mux of processed video and mixed audio.

use std::path::{Path, PathBuf};

use zoomcast_common::ffmpeg::{command_exists, ffmpeg_binary, run_ffmpeg_with};
use zoomcast_common::{ZoomcastError, ZoomcastResult};
use zoomcast_session_model::QualityTier;

/// The file a render ended up producing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// Final container path.
    pub path: PathBuf,

    /// Whether the container carries an audio track.
    pub audio_included: bool,

    /// True when the encoder could not run and the video was placed as-is.
    pub degraded: bool,
}

/// Runs the external encoder to produce the final compressed file.
///
/// Encoder failures are not fatal: the input video is moved to the output
/// path without audio and the artifact is marked degraded. An error is
/// returned only when no output file could be placed at all.
#[derive(Debug, Clone)]
pub struct EncoderGateway {
    binary: String,
}

impl Default for EncoderGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderGateway {
    /// Gateway using `ZOOMCAST_FFMPEG` or `ffmpeg` on `PATH`.
    pub fn new() -> Self {
        Self {
            binary: ffmpeg_binary(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn is_available(&self) -> bool {
        command_exists(&self.binary)
    }

    /// Encoder arguments for one mux.
    pub fn mux_args(
        video: &Path,
        audio: Option<&Path>,
        quality: QualityTier,
        output: &Path,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            video.to_string_lossy().into_owned(),
        ];
        if let Some(audio) = audio {
            args.extend(["-i".into(), audio.to_string_lossy().into_owned()]);
        }

        args.extend([
            "-map".into(),
            "0:v:0".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "medium".into(),
            "-crf".into(),
            quality.crf().to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ]);

        if audio.is_some() {
            args.extend([
                "-map".into(),
                "1:a:0".into(),
                "-c:a".into(),
                "aac".into(),
                "-b:a".into(),
                "192k".into(),
                "-shortest".into(),
            ]);
        } else {
            args.push("-an".into());
        }

        args.extend([
            "-movflags".into(),
            "+faststart".into(),
            output.to_string_lossy().into_owned(),
        ]);
        args
    }

    /// Mux `video` and the optional `audio` into `output`.
    pub fn mux(
        &self,
        video: &Path,
        audio: Option<&Path>,
        quality: QualityTier,
        output: &Path,
    ) -> ZoomcastResult<RenderedArtifact> {
        if !video.exists() {
            return Err(ZoomcastError::FileNotFound {
                path: video.to_path_buf(),
            });
        }
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let audio = audio.filter(|path| {
            let present = path.exists();
            if !present {
                tracing::warn!(audio = %path.display(), "Audio file missing, muxing video only");
            }
            present
        });

        tracing::info!(
            video = %video.display(),
            audio = ?audio.map(|p| p.display().to_string()),
            quality = %quality,
            output = %output.display(),
            "Muxing final output"
        );

        let args = Self::mux_args(video, audio, quality, output);
        match run_ffmpeg_with(&self.binary, &args) {
            Ok(()) => {
                tracing::info!(output = %output.display(), "Mux complete");
                Ok(RenderedArtifact {
                    path: output.to_path_buf(),
                    audio_included: audio.is_some(),
                    degraded: false,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Encoder failed, keeping video without audio");
                place_output(video, output).map_err(|place_err| {
                    tracing::error!(
                        error = %place_err,
                        video = %video.display(),
                        "Could not place any output file"
                    );
                    place_err
                })?;
                Ok(RenderedArtifact {
                    path: output.to_path_buf(),
                    audio_included: false,
                    degraded: true,
                })
            }
        }
    }
}

/// Move `from` to `to`, copying across filesystems when a rename fails.
fn place_output(from: &Path, to: &Path) -> ZoomcastResult<()> {
    if to.exists() {
        std::fs::remove_file(to)?;
    }
    if let Err(rename_err) = std::fs::rename(from, to) {
        tracing::debug!(error = %rename_err, "Rename failed, copying instead");
        std::fs::copy(from, to)?;
        if let Err(e) = std::fs::remove_file(from) {
            tracing::warn!(error = %e, path = %from.display(), "Could not remove moved source");
        }
    }
    Ok(())
}
