//! ffmpeg / ffprobe process helpers.
//!
//! Binaries are resolved from `ZOOMCAST_FFMPEG` / `ZOOMCAST_FFPROBE`, else
//! looked up on `PATH`.

use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use crate::error::{ZoomcastError, ZoomcastResult};

pub const FFMPEG_ENV: &str = "ZOOMCAST_FFMPEG";
pub const FFPROBE_ENV: &str = "ZOOMCAST_FFPROBE";

/// Keep at most this much ffmpeg stderr in error messages.
const STDERR_TAIL_BYTES: usize = 2000;

pub fn ffmpeg_binary() -> String {
    std::env::var(FFMPEG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "ffmpeg".to_string())
}

pub fn ffprobe_binary() -> String {
    std::env::var(FFPROBE_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "ffprobe".to_string())
}

/// True if `binary -version` runs and exits successfully.
pub fn command_exists(binary: &str) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Basic facts about the first video stream of a file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Parse an ffprobe rate such as `30000/1001` or `30`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().ok()?;
            let den = den.parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Parse one `WIDTHxHEIGHTxRATE` line as printed by [`probe_video`].
pub fn parse_probe_line(line: &str) -> Option<VideoStreamInfo> {
    let mut parts = line.trim().splitn(3, 'x');
    let width = parts.next()?.parse::<u32>().ok()?;
    let height = parts.next()?.parse::<u32>().ok()?;
    let fps = parts.next().and_then(parse_frame_rate).unwrap_or(0.0);
    if width == 0 || height == 0 {
        return None;
    }
    Some(VideoStreamInfo { width, height, fps })
}

/// Read width, height and frame rate with ffprobe.
pub fn probe_video(path: &Path) -> Option<VideoStreamInfo> {
    let output = Command::new(ffprobe_binary())
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate",
            "-of",
            "csv=p=0:s=x",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    parse_probe_line(raw.lines().next()?)
}

/// Container duration in seconds, when ffprobe can read one.
pub fn probe_duration(path: &Path) -> Option<f64> {
    let output = Command::new(ffprobe_binary())
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8(output.stdout)
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}

/// Drain a child's stderr on a helper thread so ffmpeg never blocks on a
/// full pipe.
pub fn spawn_stderr_drain(stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    })
}

/// Last few lines of ffmpeg output, for error messages.
pub fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed;
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}

/// Run ffmpeg to completion with `args`.
///
/// A missing binary is [`ZoomcastError::EncoderUnavailable`]; a non-zero
/// exit is [`ZoomcastError::EncoderFailed`] carrying the stderr tail.
pub fn run_ffmpeg(args: &[String]) -> ZoomcastResult<()> {
    run_ffmpeg_with(&ffmpeg_binary(), args)
}

/// [`run_ffmpeg`] with an explicit binary.
pub fn run_ffmpeg_with(binary: &str, args: &[String]) -> ZoomcastResult<()> {
    tracing::debug!(binary = %binary, ?args, "Running ffmpeg");

    let output = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            ZoomcastError::encoder_unavailable(format!("failed to start {binary}: {e}"))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ZoomcastError::encoder_failed(format!(
            "{binary} exited with {}: {}",
            output.status,
            stderr_tail(&stderr)
        )));
    }
    Ok(())
}

/// An ffmpeg child fed raw frames on stdin.
pub struct RawVideoWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    frame_bytes: usize,
    frames_written: u64,
}

impl RawVideoWriter {
    /// Spawn ffmpeg with `args`, which must read `-i -`.
    pub fn spawn(args: &[String], frame_bytes: usize) -> ZoomcastResult<Self> {
        let binary = ffmpeg_binary();
        tracing::debug!(binary = %binary, ?args, "Starting ffmpeg writer");
        let mut child = Command::new(&binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ZoomcastError::encoder_unavailable(format!("failed to start {binary}: {e}"))
            })?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take().map(spawn_stderr_drain);
        Ok(Self {
            child,
            stdin,
            stderr,
            frame_bytes,
            frames_written: 0,
        })
    }

    pub fn write(&mut self, frame: &[u8]) -> ZoomcastResult<()> {
        if frame.len() != self.frame_bytes {
            return Err(ZoomcastError::capture(format!(
                "frame is {} bytes, writer expects {}",
                frame.len(),
                self.frame_bytes
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ZoomcastError::capture("ffmpeg writer already finished"))?;
        stdin
            .write_all(frame)
            .map_err(|e| ZoomcastError::encoder_failed(format!("ffmpeg stopped accepting frames: {e}")))?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Close stdin and wait for ffmpeg to finish the file.
    pub fn finish(&mut self) -> ZoomcastResult<()> {
        let Some(stdin) = self.stdin.take() else {
            return Ok(());
        };
        drop(stdin);
        let status = self
            .child
            .wait()
            .map_err(|e| ZoomcastError::encoder_failed(format!("failed to wait on ffmpeg: {e}")))?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(ZoomcastError::encoder_failed(format!(
                "ffmpeg writer exited with {status}: {}",
                stderr_tail(&stderr)
            )));
        }
        tracing::debug!(frames = self.frames_written, "ffmpeg writer finished");
        Ok(())
    }
}

impl Drop for RawVideoWriter {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.wait();
        }
    }
}

/// An ffmpeg child producing raw frames on stdout.
pub struct RawVideoReader {
    child: Child,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
    frame_bytes: usize,
}

impl RawVideoReader {
    /// Spawn ffmpeg with `args`, which must write rawvideo to `-`.
    pub fn spawn(args: &[String], frame_bytes: usize) -> ZoomcastResult<Self> {
        let binary = ffmpeg_binary();
        tracing::debug!(binary = %binary, ?args, "Starting ffmpeg reader");
        let mut child = Command::new(&binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ZoomcastError::encoder_unavailable(format!("failed to start {binary}: {e}"))
            })?;

        let stdout = child.stdout.take().map(BufReader::new);
        let stderr = child.stderr.take().map(spawn_stderr_drain);
        Ok(Self {
            child,
            stdout,
            stderr,
            frame_bytes,
        })
    }

    /// Read one frame. `None` at end of stream.
    pub fn read_frame(&mut self) -> ZoomcastResult<Option<Vec<u8>>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };
        let mut frame = vec![0u8; self.frame_bytes];
        let mut filled = 0;
        while filled < frame.len() {
            match stdout.read(&mut frame[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(ZoomcastError::capture(format!(
                        "failed reading ffmpeg output: {e}"
                    )))
                }
            }
        }
        if filled == 0 {
            self.stdout = None;
            return Ok(None);
        }
        if filled < frame.len() {
            tracing::warn!(bytes = filled, expected = frame.len(), "Discarding truncated final frame");
            self.stdout = None;
            return Ok(None);
        }
        Ok(Some(frame))
    }

    /// Wait for ffmpeg and report how it exited. `Err` carries the stderr
    /// tail when the exit status is non-zero.
    pub fn finish(&mut self) -> ZoomcastResult<()> {
        self.stdout = None;
        let status = self
            .child
            .wait()
            .map_err(|e| ZoomcastError::capture(format!("failed to wait on ffmpeg: {e}")))?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(ZoomcastError::encoder_failed(format!(
                "ffmpeg reader exited with {status}: {}",
                stderr_tail(&stderr)
            )));
        }
        Ok(())
    }

    /// Stop the child without waiting for end of stream.
    pub fn kill(&mut self) {
        self.stdout = None;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for RawVideoReader {
    fn drop(&mut self) {
        if self.stdout.is_some() {
            self.kill();
        }
    }
}
