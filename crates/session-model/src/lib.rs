//! zoomcast session model
//!
//! Defines the data contracts shared by the capture and render sides:
//! - **Events:** timestamped pointer moves, clicks, and pause markers
//! - **EventLog:** the thread-safe, append-only record producers write into
//! - **Pause intervals:** cuts derived from pause markers
//! - **Regions and settings:** capture rectangle, audio mode, quality tier
//! - **Manifest:** what a finished recording left on disk
//!
//! Pointer coordinates are device-space pixels relative to the capture
//! region's top-left corner, before any zoom is applied.

pub mod event;
pub mod event_log;
pub mod manifest;
pub mod pause;
pub mod region;
pub mod settings;

pub use event::*;
pub use event_log::*;
pub use manifest::*;
pub use pause::*;
pub use region::*;
pub use settings::*;
