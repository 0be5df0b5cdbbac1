//! zoomcast common utilities
//!
//! Shared infrastructure for all zoomcast crates:
//! - Error types and result aliases
//! - The session anchor clock shared by every capture producer
//! - Bounded thread shutdown
//! - ffmpeg/ffprobe process helpers
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod logging;
pub mod shutdown;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use shutdown::join_with_timeout;
