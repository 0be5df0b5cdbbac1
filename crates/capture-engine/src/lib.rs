//! zoomcast capture engine
//!
//! Runs a recording session: a frame-paced video loop, the audio capture
//! engine and the pointer tracker, all sharing one session anchor.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 RecordingSession                 │
//! │  ┌─────────────┐ ┌──────────────┐ ┌────────────┐ │
//! │  │ VideoCapture│ │ AudioCapture │ │InputTracker│ │
//! │  │ Loop        │ │ Engine       │ │ (tokio)    │ │
//! │  └──────┬──────┘ └──────┬───────┘ └─────┬──────┘ │
//! │         │   SessionAnchor (first frame) │        │
//! │         ▼               ▼               ▼        │
//! │  ┌────────────────────────────────────────────┐  │
//! │  │ <name>_raw.mkv  <name>_audio.wav           │  │
//! │  │ <name>_events.json  <name>_session.json    │  │
//! │  └────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod ffmpeg;
pub mod live;
pub mod session;
pub mod synthetic;
pub mod video;

pub use ffmpeg::{probe_screen_size, FfmpegRawWriter, FfmpegScreenGrabber};
pub use live::LiveZoomProcessor;
pub use session::*;
pub use synthetic::{MemorySink, SyntheticFrameSource};
pub use video::{
    FramePacer, FrameProcessor, FrameSink, FrameSource, PassThrough, VideoCaptureLoop,
    VideoCaptureReport,
};
