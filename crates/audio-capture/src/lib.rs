//! zoomcast audio capture
//!
//! Captures up to two audio sources per session and mixes them into one
//! PCM WAV file:
//! - **System loopback:** read continuously; silence the device omits is
//!   re-inserted by [`drift::DriftCompensator`]
//! - **Microphone:** mono blocks, skipped while paused
//!
//! Each source runs on its own thread and publishes immutable chunks over a
//! channel to a single consolidator thread, which owns the track buffers
//! until stop. All relative timing comes from the shared
//! [`zoomcast_common::SessionAnchor`].

pub mod backend;
pub mod consolidator;
pub mod cpal_backend;
pub mod drift;
pub mod engine;
pub mod mixdown;
pub mod settings;
pub mod synthetic;
pub mod wav;

pub use backend::{AudioBackend, BlockStream, DeviceInfo, StreamFormat};
pub use cpal_backend::{list_input_devices, CpalBackend};
pub use engine::AudioCaptureEngine;
pub use settings::AudioSettings;
pub use synthetic::SyntheticBackend;
