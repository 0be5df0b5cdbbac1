//! zoomcast render engine
//!
//! Offline pass that turns a recorded session into the final video.
//!
//! # Pipeline Architecture
//!
//! ```text
//! <name>_raw.mkv ──┐
//!                  ├── decode (ffmpeg, one repair attempt)
//! <name>_events ───┘         │
//!                            ├── pause cuts / active-time mapping
//!                            ├── zoom + pan replay (EffectReplayer)
//!                            ├── cursor + click ripple overlay
//!                            ▼
//!                  <output>_processed_video.mkv
//!                            │
//! <name>_audio.wav ──────────┤
//!                            ▼
//!                   EncoderGateway (H.264 + AAC)
//!                            │
//!                            ▼
//!                       output.mp4
//! ```

pub mod encoder;
pub mod frames;
pub mod post_process;

pub use encoder::{EncoderGateway, RenderedArtifact};
pub use frames::{
    FfmpegFrameDecoder, FfmpegFrameWriter, FrameDecoder, MemoryFrameDecoder, MemoryFrameWriter,
    ProcessedFrameWriter,
};
pub use post_process::*;
