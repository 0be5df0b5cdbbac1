//! Error types shared across zoomcast crates.

use std::path::PathBuf;

/// Top-level error type for zoomcast operations.
///
/// The first block of variants mirrors the recovery policy of a recording
/// session: each one has a defined fallback (downgrade, skip the stream,
/// repair, degrade the output) and only the inability to produce any output
/// file is treated as fatal by callers.
#[derive(Debug, thiserror::Error)]
pub enum ZoomcastError {
    #[error("Capture backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("Device not found: {message}")]
    DeviceNotFound { message: String },

    #[error("Stream read error: {message}")]
    StreamRead { message: String },

    #[error("Container corrupt or undecodable: {path}")]
    ContainerCorrupt { path: PathBuf },

    #[error("Encoder unavailable: {message}")]
    EncoderUnavailable { message: String },

    #[error("Encoder failed: {message}")]
    EncoderFailed { message: String },

    #[error("Thread '{thread}' did not stop within {timeout_ms} ms")]
    ThreadJoinTimeout { thread: String, timeout_ms: u64 },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ZoomcastError.
pub type ZoomcastResult<T> = Result<T, ZoomcastError>;

impl ZoomcastError {
    pub fn backend_unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: msg.into(),
        }
    }

    pub fn device_not_found(msg: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            message: msg.into(),
        }
    }

    pub fn stream_read(msg: impl Into<String>) -> Self {
        Self::StreamRead {
            message: msg.into(),
        }
    }

    pub fn encoder_unavailable(msg: impl Into<String>) -> Self {
        Self::EncoderUnavailable {
            message: msg.into(),
        }
    }

    pub fn encoder_failed(msg: impl Into<String>) -> Self {
        Self::EncoderFailed {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_timeout_message() {
        let err = ZoomcastError::ThreadJoinTimeout {
            thread: "mic".into(),
            timeout_ms: 2000,
        };
        assert_eq!(err.to_string(), "Thread 'mic' did not stop within 2000 ms");
    }
}
