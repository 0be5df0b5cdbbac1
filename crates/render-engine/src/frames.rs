//! Frame decoding and writing for the offline pass.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;
use parking_lot::Mutex;

use zoomcast_common::ffmpeg::{probe_video, run_ffmpeg, RawVideoReader, RawVideoWriter, VideoStreamInfo};
use zoomcast_common::{ZoomcastError, ZoomcastResult};

/// Sequential reader of decoded RGB frames.
pub trait FrameDecoder: Send {
    /// Stream geometry and nominal frame rate.
    fn info(&self) -> VideoStreamInfo;

    /// The next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> ZoomcastResult<Option<RgbImage>>;

    /// Release the decoder. Reports decode errors hidden behind end of stream.
    fn finish(&mut self) -> ZoomcastResult<()> {
        Ok(())
    }
}

/// Destination for processed frames.
pub trait ProcessedFrameWriter: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> ZoomcastResult<()>;

    fn finish(&mut self) -> ZoomcastResult<()>;
}

/// Decodes a container to `rgb24` through an ffmpeg pipe.
pub struct FfmpegFrameDecoder {
    info: VideoStreamInfo,
    reader: RawVideoReader,
    path: PathBuf,
}

impl FfmpegFrameDecoder {
    /// Open `path`. A stream ffprobe cannot read is [`ZoomcastError::ContainerCorrupt`].
    ///
    /// `fallback_fps` is used when the container reports no frame rate.
    pub fn open(path: &Path, fallback_fps: f64) -> ZoomcastResult<Self> {
        if !path.exists() {
            return Err(ZoomcastError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let mut info = probe_video(path).ok_or_else(|| ZoomcastError::ContainerCorrupt {
            path: path.to_path_buf(),
        })?;
        if info.width == 0 || info.height == 0 {
            return Err(ZoomcastError::ContainerCorrupt {
                path: path.to_path_buf(),
            });
        }
        if info.fps <= 0.0 {
            tracing::warn!(fallback_fps, "Container reports no frame rate");
            info.fps = fallback_fps;
        }

        let args: Vec<String> = vec![
            "-loglevel".into(),
            "error".into(),
            "-nostdin".into(),
            "-i".into(),
            path.to_string_lossy().into_owned(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-".into(),
        ];
        let frame_bytes = info.width as usize * info.height as usize * 3;
        let reader = RawVideoReader::spawn(&args, frame_bytes)?;
        tracing::info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Decoder opened"
        );
        Ok(Self {
            info,
            reader,
            path: path.to_path_buf(),
        })
    }
}

impl FrameDecoder for FfmpegFrameDecoder {
    fn info(&self) -> VideoStreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> ZoomcastResult<Option<RgbImage>> {
        let Some(raw) = self.reader.read_frame()? else {
            return Ok(None);
        };
        RgbImage::from_raw(self.info.width, self.info.height, raw)
            .map(Some)
            .ok_or_else(|| ZoomcastError::ContainerCorrupt {
                path: self.path.clone(),
            })
    }

    fn finish(&mut self) -> ZoomcastResult<()> {
        self.reader.finish()
    }
}

/// Encodes processed frames to a silent intermediate file.
pub struct FfmpegFrameWriter {
    writer: RawVideoWriter,
    path: PathBuf,
}

impl FfmpegFrameWriter {
    pub fn args(path: &Path, width: u32, height: u32, fps: f64) -> Vec<String> {
        vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-s".into(),
            format!("{width}x{height}"),
            "-r".into(),
            format!("{fps}"),
            "-i".into(),
            "-".into(),
            "-an".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "ultrafast".into(),
            "-crf".into(),
            "0".into(),
            path.to_string_lossy().into_owned(),
        ]
    }

    pub fn create(path: &Path, width: u32, height: u32, fps: f64) -> ZoomcastResult<Self> {
        let frame_bytes = width as usize * height as usize * 3;
        let writer = RawVideoWriter::spawn(&Self::args(path, width, height, fps), frame_bytes)?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProcessedFrameWriter for FfmpegFrameWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> ZoomcastResult<()> {
        self.writer.write(frame.as_raw())
    }

    fn finish(&mut self) -> ZoomcastResult<()> {
        self.writer.finish()?;
        tracing::debug!(
            path = %self.path.display(),
            frames = self.writer.frames_written(),
            "Processed video written"
        );
        Ok(())
    }
}

/// Path of the stream-copied repair of `video`.
pub fn repaired_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    video.with_file_name(format!("{stem}_fixed.mkv"))
}

/// Rewrite the container with a stream copy, which recovers recordings
/// whose writer was killed before finalizing.
pub fn repair_container(video: &Path) -> ZoomcastResult<PathBuf> {
    let repaired = repaired_path(video);
    if repaired.exists() {
        std::fs::remove_file(&repaired)?;
    }
    tracing::warn!(video = %video.display(), "Attempting container repair");
    let args: Vec<String> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        video.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        repaired.to_string_lossy().into_owned(),
    ];
    run_ffmpeg(&args)?;
    Ok(repaired)
}

/// Decoder over frames held in memory.
pub struct MemoryFrameDecoder {
    info: VideoStreamInfo,
    frames: VecDeque<RgbImage>,
}

impl MemoryFrameDecoder {
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        Self {
            info: VideoStreamInfo { width, height, fps },
            frames: frames.into(),
        }
    }
}

impl FrameDecoder for MemoryFrameDecoder {
    fn info(&self) -> VideoStreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> ZoomcastResult<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

/// Writer collecting processed frames in memory.
#[derive(Default)]
pub struct MemoryFrameWriter {
    frames: Arc<Mutex<Vec<RgbImage>>>,
}

impl MemoryFrameWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Arc<Mutex<Vec<RgbImage>>> {
        self.frames.clone()
    }
}

impl ProcessedFrameWriter for MemoryFrameWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> ZoomcastResult<()> {
        self.frames.lock().push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> ZoomcastResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repaired_path_sits_next_to_source() {
        assert_eq!(
            repaired_path(Path::new("/rec/demo_raw.mkv")),
            PathBuf::from("/rec/demo_raw_fixed.mkv")
        );
    }

    #[test]
    fn test_open_missing_file() {
        let err = FfmpegFrameDecoder::open(Path::new("/nonexistent/zoomcast.mkv"), 30.0);
        assert!(matches!(err, Err(ZoomcastError::FileNotFound { .. })));
    }

    #[test]
    fn test_memory_decoder_reports_geometry() {
        let mut decoder = MemoryFrameDecoder::new(vec![RgbImage::new(8, 6); 2], 25.0);
        let info = decoder.info();
        assert_eq!((info.width, info.height), (8, 6));
        assert!(decoder.next_frame().unwrap().is_some());
        assert!(decoder.next_frame().unwrap().is_some());
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_writer_args_are_silent() {
        let args = FfmpegFrameWriter::args(Path::new("out.mkv"), 320, 240, 30.0);
        let joined = args.join(" ");
        assert!(joined.contains("-s 320x240"));
        assert!(joined.contains("-r 30"));
        assert!(joined.contains("-an"));
    }
}
