//! `/dev/input/mice` reader.
//!
//! The PS/2-style mice device multiplexes every pointer on the system into
//! 3-byte packets of button state and relative motion. The absolute
//! position is integrated from the deltas and clamped to the desktop.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Read;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};

use zoomcast_common::{ZoomcastError, ZoomcastResult};

use crate::{InputBackend, PointerButton, PointerSample};

const MICE_DEVICE: &str = "/dev/input/mice";

const BUTTONS: [(u8, PointerButton); 3] = [
    (0b001, PointerButton::Left),
    (0b010, PointerButton::Right),
    (0b100, PointerButton::Middle),
];

pub struct EvdevBackend {
    device: std::fs::File,
    pending: VecDeque<PointerSample>,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    buttons_down: u8,
}

impl EvdevBackend {
    /// Open the device; the pointer starts at the center of the desktop.
    pub fn new(desktop_width: u32, desktop_height: u32) -> ZoomcastResult<Self> {
        let device = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(MICE_DEVICE)
            .map_err(|e| ZoomcastError::capture(format!("Failed to open {MICE_DEVICE}: {e}")))?;

        let width = desktop_width.max(1) as f64;
        let height = desktop_height.max(1) as f64;
        Ok(Self {
            device,
            pending: VecDeque::new(),
            x: width / 2.0,
            y: height / 2.0,
            width,
            height,
            buttons_down: 0,
        })
    }

    pub fn is_supported() -> bool {
        OpenOptions::new().read(true).open(MICE_DEVICE).is_ok()
    }

    fn ingest_packets(&mut self) -> ZoomcastResult<()> {
        loop {
            let mut packet = [0u8; 3];
            match self.device.read(&mut packet) {
                Ok(3) => self.process_packet(packet),
                Ok(_) => break,
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    return Err(ZoomcastError::capture(format!(
                        "Failed reading {MICE_DEVICE}: {err}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn process_packet(&mut self, packet: [u8; 3]) {
        let dx = packet[1] as i8 as f64;
        let dy = packet[2] as i8 as f64;

        if dx != 0.0 || dy != 0.0 {
            // Device y grows upwards.
            self.x = (self.x + dx).clamp(0.0, self.width - 1.0);
            self.y = (self.y - dy).clamp(0.0, self.height - 1.0);
            self.pending.push_back(PointerSample::Move {
                x: self.x,
                y: self.y,
            });
        }

        let state = packet[0] & 0b111;
        for (mask, button) in BUTTONS {
            let was_down = self.buttons_down & mask != 0;
            let is_down = state & mask != 0;
            if is_down && !was_down {
                self.pending.push_back(PointerSample::Click {
                    x: self.x,
                    y: self.y,
                    button,
                });
            }
        }
        self.buttons_down = state;
    }
}

impl InputBackend for EvdevBackend {
    fn poll(&mut self) -> ZoomcastResult<Option<PointerSample>> {
        if let Some(sample) = self.pending.pop_front() {
            return Ok(Some(sample));
        }

        self.ingest_packets()?;
        Ok(self.pending.pop_front())
    }

    fn name(&self) -> &str {
        "evdev"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn position(&self) -> Option<(f64, f64)> {
        Some((self.x, self.y))
    }
}

pub(crate) fn mice_device_diagnostic() -> String {
    // SAFETY: geteuid/getegid have no preconditions and cannot fail.
    let uid = unsafe { libc::geteuid() };
    let gid = unsafe { libc::getegid() };

    match std::fs::metadata(MICE_DEVICE) {
        Ok(meta) => format!(
            "device={MICE_DEVICE} mode={:o} owner_uid={} owner_gid={} process_uid={uid} process_gid={gid}; likely missing 'input' group membership. Fix: sudo usermod -aG input $USER && log out/in",
            meta.mode() & 0o777,
            meta.uid(),
            meta.gid(),
        ),
        Err(err) => format!(
            "device={MICE_DEVICE} unavailable ({err}); ensure the kernel input device exists and is readable"
        ),
    }
}
