//! Crop window for a zoom level.
//!
//! A zoom of `z` keeps a `width / z` by `height / z` window (at least one
//! pixel) centered on the pan center, clamped inside the frame, and scales it
//! back up to full frame size. Because of integer truncation the effective
//! scale differs slightly from `z`; overlays must use the effective scale.

use serde::Serialize;
use zoomcast_session_model::Point2D;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Output width / crop width.
    pub scale_x: f64,
    /// Output height / crop height.
    pub scale_y: f64,
}

impl CropWindow {
    /// Identity crop for a frame.
    pub fn full(frame_width: u32, frame_height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: frame_width,
            height: frame_height,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    pub fn compute(frame_width: u32, frame_height: u32, zoom: f64, center: Point2D) -> Self {
        if frame_width == 0 || frame_height == 0 {
            return Self::full(frame_width, frame_height);
        }
        let zoom = if zoom.is_finite() { zoom.max(1.0) } else { 1.0 };

        let width = ((frame_width as f64 / zoom) as u32).clamp(1, frame_width);
        let height = ((frame_height as f64 / zoom) as u32).clamp(1, frame_height);

        let x = clamp_origin(center.x, width, frame_width);
        let y = clamp_origin(center.y, height, frame_height);

        Self {
            x,
            y,
            width,
            height,
            scale_x: frame_width as f64 / width as f64,
            scale_y: frame_height as f64 / height as f64,
        }
    }

    pub fn is_full_frame(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == frame_width && self.height == frame_height
    }

    /// Map a device-space point into the resized output frame.
    pub fn project(&self, point: Point2D) -> Point2D {
        Point2D::new(
            (point.x - self.x as f64) * self.scale_x,
            (point.y - self.y as f64) * self.scale_y,
        )
    }
}

fn clamp_origin(center: f64, size: u32, frame: u32) -> u32 {
    let max_origin = (frame - size) as f64;
    let origin = (center - (size / 2) as f64).min(max_origin).max(0.0);
    if origin.is_finite() {
        origin as u32
    } else {
        0
    }
}
