//! Input tracking backend implementations.
//!
//! Each backend provides a different way to follow the pointer.

#[cfg(target_os = "linux")]
mod evdev;
mod scripted;

#[cfg(target_os = "linux")]
pub use evdev::EvdevBackend;
pub use scripted::ScriptedBackend;

use crate::InputBackend;

/// Detect the best available input backend for the current system.
///
/// `desktop_size` seeds the pointer position for relative-motion devices.
pub fn detect_best_backend(desktop_size: (u32, u32)) -> Box<dyn InputBackend> {
    #[cfg(target_os = "linux")]
    {
        if EvdevBackend::is_supported() {
            match EvdevBackend::new(desktop_size.0, desktop_size.1) {
                Ok(backend) => {
                    tracing::info!("Using evdev backend");
                    return Box::new(backend);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to initialize evdev backend, using stub");
                }
            }
        }
        tracing::warn!(
            details = %evdev::mice_device_diagnostic(),
            "Using stub input backend; pointer and click events will not be captured"
        );
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = desktop_size;
        tracing::warn!(
            "Input capture backends for this platform are not implemented yet; using stub backend"
        );
    }

    Box::new(ScriptedBackend::empty())
}
