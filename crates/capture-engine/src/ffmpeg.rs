//! ffmpeg-backed screen grabbing and raw video writing.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TrySendError};
use image::RgbImage;
use parking_lot::Mutex;

use zoomcast_common::ffmpeg::{ffprobe_binary, parse_probe_line, RawVideoReader, RawVideoWriter};
use zoomcast_common::{ZoomcastError, ZoomcastResult};
use zoomcast_session_model::CaptureRegion;

use crate::video::{FrameSink, FrameSource};

const FALLBACK_SCREEN_SIZE: (u32, u32) = (1920, 1080);

/// Platform grab-device arguments, plus a crop filter where the device
/// cannot capture a sub-rectangle itself.
fn platform_input(fps: u32, region: &CaptureRegion) -> (Vec<String>, Option<String>) {
    let mut args: Vec<String> = vec!["-framerate".into(), fps.to_string()];

    if cfg!(target_os = "windows") {
        args.extend([
            "-f".into(),
            "gdigrab".into(),
            "-draw_mouse".into(),
            "0".into(),
            "-offset_x".into(),
            region.left.to_string(),
            "-offset_y".into(),
            region.top.to_string(),
            "-video_size".into(),
            format!("{}x{}", region.width, region.height),
            "-i".into(),
            "desktop".into(),
        ]);
        (args, None)
    } else if cfg!(target_os = "macos") {
        let screen = std::env::var("ZOOMCAST_AVFOUNDATION_SCREEN").unwrap_or_else(|_| "1".into());
        args.extend([
            "-f".into(),
            "avfoundation".into(),
            "-capture_cursor".into(),
            "0".into(),
            "-i".into(),
            format!("{screen}:none"),
        ]);
        let crop = format!(
            "crop={}:{}:{}:{}",
            region.width, region.height, region.left, region.top
        );
        (args, Some(crop))
    } else {
        let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0.0".into());
        args.extend([
            "-f".into(),
            "x11grab".into(),
            "-draw_mouse".into(),
            "0".into(),
            "-video_size".into(),
            format!("{}x{}", region.width, region.height),
            "-i".into(),
            format!("{display}+{},{}", region.left, region.top),
        ]);
        (args, None)
    }
}

/// Full-screen size via ffprobe on the platform grab device.
///
/// Falls back to 1920x1080 with a warning when probing fails.
pub fn probe_screen_size() -> (u32, u32) {
    let mut cmd = Command::new(ffprobe_binary());
    cmd.args(["-v", "error"]);
    if cfg!(target_os = "windows") {
        cmd.args(["-f", "gdigrab", "-i", "desktop"]);
    } else if cfg!(target_os = "macos") {
        cmd.args(["-f", "avfoundation", "-i", "1:none"]);
    } else {
        let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0.0".into());
        cmd.args(["-f", "x11grab", "-i"]).arg(display);
    }
    cmd.args([
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height",
        "-of",
        "csv=p=0:s=x",
    ]);

    let probed = cmd
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .and_then(|raw| raw.lines().next().and_then(parse_probe_line));

    match probed {
        Some(info) => (info.width, info.height),
        None => {
            tracing::warn!(
                width = FALLBACK_SCREEN_SIZE.0,
                height = FALLBACK_SCREEN_SIZE.1,
                "Could not read screen size, assuming default"
            );
            FALLBACK_SCREEN_SIZE
        }
    }
}

/// Grabs the screen with ffmpeg, keeping only the newest frame.
///
/// A reader thread pulls `rgb24` frames off ffmpeg's stdout; when the
/// capture loop is slower than ffmpeg, stale frames are replaced rather
/// than queued.
pub struct FfmpegScreenGrabber {
    width: u32,
    height: u32,
    frames: Receiver<RgbImage>,
    failure: Arc<Mutex<Option<String>>>,
    reader: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl FfmpegScreenGrabber {
    pub fn start(region: CaptureRegion, fps: u32) -> ZoomcastResult<Self> {
        let region = region.even();
        if region.is_empty() {
            return Err(ZoomcastError::capture(format!(
                "capture region {}x{} is too small",
                region.width, region.height
            )));
        }

        let (mut args, filter) = platform_input(fps, &region);
        args.splice(0..0, ["-loglevel".to_string(), "error".to_string(), "-nostdin".to_string()]);
        if let Some(filter) = filter {
            args.extend(["-vf".into(), filter]);
        }
        args.extend([
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-".into(),
        ]);

        let frame_bytes = region.width as usize * region.height as usize * 3;
        let mut reader = RawVideoReader::spawn(&args, frame_bytes)?;
        tracing::info!(
            left = region.left,
            top = region.top,
            width = region.width,
            height = region.height,
            fps,
            "Screen grabber started"
        );

        let (tx, rx) = bounded::<RgbImage>(1);
        let drain = rx.clone();
        let failure = Arc::new(Mutex::new(None));
        let failure_slot = Arc::clone(&failure);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_reader = Arc::clone(&stop);
        let (width, height) = (region.width, region.height);

        let handle = std::thread::Builder::new()
            .name("screen-grabber".into())
            .spawn(move || {
                loop {
                    if stop_reader.load(Ordering::Relaxed) {
                        reader.kill();
                        break;
                    }
                    let raw = match reader.read_frame() {
                        Ok(Some(raw)) => raw,
                        Ok(None) => {
                            if let Err(e) = reader.finish() {
                                *failure_slot.lock() = Some(e.to_string());
                            }
                            break;
                        }
                        Err(e) => {
                            *failure_slot.lock() = Some(e.to_string());
                            reader.kill();
                            break;
                        }
                    };
                    let Some(frame) = RgbImage::from_raw(width, height, raw) else {
                        continue;
                    };
                    if let Err(TrySendError::Full(frame)) = tx.try_send(frame) {
                        let _ = drain.try_recv();
                        let _ = tx.try_send(frame);
                    }
                }
            })?;

        Ok(Self {
            width,
            height,
            frames: rx,
            failure,
            reader: Some(handle),
            stop,
        })
    }
}

impl FrameSource for FfmpegScreenGrabber {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self, timeout: Duration) -> ZoomcastResult<Option<RgbImage>> {
        match self.frames.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                let reason = self
                    .failure
                    .lock()
                    .take()
                    .unwrap_or_else(|| "screen grabber ended".to_string());
                Err(ZoomcastError::capture(reason))
            }
        }
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

impl Drop for FfmpegScreenGrabber {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // An unfinished reader kills ffmpeg on its next frame and exits.
        if let Some(handle) = self.reader.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

/// Writes frames to a lossless Matroska intermediate.
pub struct FfmpegRawWriter {
    writer: RawVideoWriter,
    path: PathBuf,
}

impl FfmpegRawWriter {
    /// Encoder arguments for the intermediate file.
    pub fn args(path: &Path, width: u32, height: u32, fps: u32) -> Vec<String> {
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
            fps.to_string(),
            "-i".into(),
            "-".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "ultrafast".into(),
            "-crf".into(),
            "0".into(),
            path.to_string_lossy().into_owned(),
        ]
    }

    pub fn create(path: &Path, width: u32, height: u32, fps: u32) -> ZoomcastResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let frame_bytes = width as usize * height as usize * 3;
        let writer = RawVideoWriter::spawn(&Self::args(path, width, height, fps), frame_bytes)?;
        tracing::info!(path = %path.display(), width, height, fps, "Raw video writer started");
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSink for FfmpegRawWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> ZoomcastResult<()> {
        self.writer.write(frame.as_raw())
    }

    fn finish(&mut self) -> ZoomcastResult<()> {
        self.writer.finish()?;
        tracing::info!(
            path = %self.path.display(),
            frames = self.writer.frames_written(),
            "Raw video finalized"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_writer_args_are_lossless() {
        let args = FfmpegRawWriter::args(Path::new("/tmp/raw.mkv"), 640, 480, 30);
        let joined = args.join(" ");
        assert!(joined.contains("-s 640x480"));
        assert!(joined.contains("-preset ultrafast -crf 0"));
        assert!(joined.ends_with("/tmp/raw.mkv"));
    }

    #[test]
    fn test_platform_input_uses_region() {
        let region = CaptureRegion::new(10, 20, 640, 480);
        let (args, _) = platform_input(30, &region);
        let joined = args.join(" ");
        assert!(joined.contains("-framerate 30"));
        if cfg!(target_os = "linux") {
            assert!(joined.contains("x11grab"));
            assert!(joined.contains("-video_size 640x480"));
            assert!(joined.ends_with("+10,20"));
        }
    }

    #[test]
    fn test_tiny_region_rejected() {
        let err = FfmpegScreenGrabber::start(CaptureRegion::new(0, 0, 1, 1), 30);
        assert!(err.is_err());
    }
}
