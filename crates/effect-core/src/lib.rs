//! zoomcast effect core
//!
//! Reconstructs the smart-zoom effect from a sparse event trace:
//! - **Effect state:** exponential smoothing of zoom and pan toward click points
//! - **Crop:** zoom-to-crop-window math and the effective scale used to
//!   project device-space coordinates into the resized frame
//! - **Replay:** click/move cursors driving the state one frame at a time
//! - **Compositor:** crop, resize, ripple and cursor drawing on RGB frames
//!
//! The live capture path and the offline post-processor both go through
//! [`EffectReplayer`], so the same event trace and parameters always give
//! the same frames. This crate performs no I/O.

pub mod compositor;
pub mod crop;
pub mod effect;
pub mod replay;

pub use compositor::compose_frame;
pub use crop::CropWindow;
pub use effect::{EffectParams, EffectState};
pub use replay::{EffectReplayer, FrameEffect, Ripple};
