//! Frame compositing: crop/resize plus ripple and cursor overlays.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_polygon_mut, draw_polygon_mut};
use imageproc::point::Point;
use zoomcast_session_model::Point2D;

use crate::crop::CropWindow;
use crate::replay::{FrameEffect, Ripple};

const RIPPLE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const RIPPLE_HALF_WIDTH: i32 = 1;
const CURSOR_FILL: Rgb<u8> = Rgb([0, 255, 0]);
const CURSOR_OUTLINE: Rgb<u8> = Rgb([255, 255, 255]);

/// Arrow offsets from the cursor tip.
const CURSOR_SHAPE: [(i32, i32); 3] = [(0, 0), (0, 15), (10, 10)];

/// Render one output frame from a source frame and its effect.
pub fn compose_frame(frame: &RgbImage, effect: &FrameEffect) -> RgbImage {
    let mut out = apply_crop(frame, &effect.crop);
    if let Some(ripple) = &effect.ripple {
        draw_ripple(&mut out, ripple);
    }
    if let Some(cursor) = effect.cursor {
        draw_cursor(&mut out, cursor);
    }
    out
}

/// Crop to the window and scale back up to the source size (bilinear).
pub fn apply_crop(frame: &RgbImage, crop: &CropWindow) -> RgbImage {
    let (width, height) = frame.dimensions();
    if crop.is_full_frame(width, height) || width == 0 || height == 0 {
        return frame.clone();
    }
    let region = imageops::crop_imm(frame, crop.x, crop.y, crop.width, crop.height).to_image();
    imageops::resize(&region, width, height, FilterType::Triangle)
}

/// Draw the ripple ring on a copy of the frame, then blend the copy back
/// at the ripple's opacity.
pub fn draw_ripple(frame: &mut RgbImage, ripple: &Ripple) {
    let (width, height) = frame.dimensions();
    let alpha = ripple.opacity.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let reach = ripple.radius as f64 + RIPPLE_HALF_WIDTH as f64 + 1.0;
    if ripple.center.x + reach < 0.0
        || ripple.center.y + reach < 0.0
        || ripple.center.x - reach > width as f64
        || ripple.center.y - reach > height as f64
    {
        return;
    }

    let center = (
        ripple.center.x.round() as i32,
        ripple.center.y.round() as i32,
    );
    let radius = ripple.radius as i32;
    let mut overlay = frame.clone();
    for r in (radius - RIPPLE_HALF_WIDTH).max(0)..=radius + RIPPLE_HALF_WIDTH {
        draw_hollow_circle_mut(&mut overlay, center, r, RIPPLE_COLOR);
    }

    if alpha >= 1.0 {
        *frame = overlay;
        return;
    }
    for (base, over) in frame.pixels_mut().zip(overlay.pixels()) {
        if base != over {
            *base = blend(*base, *over, alpha);
        }
    }
}

/// Draw the filled arrow with its tip at `tip`.
pub fn draw_cursor(frame: &mut RgbImage, tip: Point2D) {
    let (width, height) = frame.dimensions();
    let tx = tip.x.round();
    let ty = tip.y.round();
    // Entirely off-frame.
    if tx < -20.0 || ty < -20.0 || tx > width as f64 + 20.0 || ty > height as f64 + 20.0 {
        return;
    }
    let (tx, ty) = (tx as i32, ty as i32);

    let filled: Vec<Point<i32>> = CURSOR_SHAPE
        .iter()
        .map(|(dx, dy)| Point::new(tx + dx, ty + dy))
        .collect();
    draw_polygon_mut(frame, &filled, CURSOR_FILL);

    let outline: Vec<Point<f32>> = filled
        .iter()
        .map(|p| Point::new(p.x as f32, p.y as f32))
        .collect();
    draw_hollow_polygon_mut(frame, &outline, CURSOR_OUTLINE);
}

fn blend(base: Rgb<u8>, over: Rgb<u8>, alpha: f64) -> Rgb<u8> {
    let mix = |b: u8, o: u8| (b as f64 * (1.0 - alpha) + o as f64 * alpha).round() as u8;
    Rgb([
        mix(base[0], over[0]),
        mix(base[1], over[1]),
        mix(base[2], over[2]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 40]))
    }

    #[test]
    fn test_identity_crop_is_copy() {
        let frame = gradient(64, 48);
        let out = apply_crop(&frame, &CropWindow::full(64, 48));
        assert_eq!(out, frame);
    }

    #[test]
    fn test_crop_keeps_frame_size() {
        let frame = gradient(64, 48);
        let crop = CropWindow::compute(64, 48, 2.0, Point2D::new(32.0, 24.0));
        let out = apply_crop(&frame, &crop);
        assert_eq!(out.dimensions(), (64, 48));
        assert_ne!(out, frame);
    }

    #[test]
    fn test_ripple_draws_ring_not_center() {
        let mut frame = RgbImage::new(100, 100);
        draw_ripple(
            &mut frame,
            &Ripple {
                center: Point2D::new(50.0, 50.0),
                radius: 20,
                opacity: 1.0,
            },
        );
        assert_eq!(*frame.get_pixel(70, 50), RIPPLE_COLOR);
        assert_eq!(*frame.get_pixel(50, 30), RIPPLE_COLOR);
        assert_eq!(*frame.get_pixel(50, 50), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_ripple_fades_with_opacity() {
        let mut frame = RgbImage::new(100, 100);
        draw_ripple(
            &mut frame,
            &Ripple {
                center: Point2D::new(50.0, 50.0),
                radius: 10,
                opacity: 0.5,
            },
        );
        assert_eq!(*frame.get_pixel(60, 50), Rgb([128, 0, 0]));
    }

    #[test]
    fn test_faded_ripple_leaves_the_rest_of_the_frame() {
        let frame = gradient(100, 100);
        let mut out = frame.clone();
        draw_ripple(
            &mut out,
            &Ripple {
                center: Point2D::new(50.0, 50.0),
                radius: 15,
                opacity: 0.4,
            },
        );
        assert_eq!(out.get_pixel(50, 50), frame.get_pixel(50, 50));
        assert_eq!(out.get_pixel(90, 90), frame.get_pixel(90, 90));
        assert_ne!(out.get_pixel(65, 50), frame.get_pixel(65, 50));
        // Ring is three pixels wide.
        assert_ne!(out.get_pixel(66, 50), frame.get_pixel(66, 50));
        assert_ne!(out.get_pixel(64, 50), frame.get_pixel(64, 50));
    }

    #[test]
    fn test_ripple_off_frame_is_noop() {
        let mut frame = RgbImage::new(10, 10);
        draw_ripple(
            &mut frame,
            &Ripple {
                center: Point2D::new(-500.0, -500.0),
                radius: 5,
                opacity: 1.0,
            },
        );
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_cursor_fill_and_outline() {
        let mut frame = RgbImage::new(40, 40);
        draw_cursor(&mut frame, Point2D::new(10.0, 10.0));
        // Inside the arrow.
        assert_eq!(*frame.get_pixel(12, 18), CURSOR_FILL);
        // Tip lies on the outline.
        assert_eq!(*frame.get_pixel(10, 10), CURSOR_OUTLINE);
        // Outside.
        assert_eq!(*frame.get_pixel(30, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_cursor_far_off_frame_skipped() {
        let mut frame = RgbImage::new(20, 20);
        draw_cursor(&mut frame, Point2D::new(-100.0, 5.0));
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
