//! Capture region and point types.
//!
//! Regions are in device pixels.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A rectangle of the desktop to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Copy with width and height rounded down to even numbers, as
    /// required by 4:2:0 encoders.
    pub fn even(&self) -> Self {
        Self {
            width: self.width & !1,
            height: self.height & !1,
            ..*self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width < 2 || self.height < 2
    }

    /// Translate a desktop coordinate into region-relative space.
    pub fn to_local(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.left as f64, y - self.top as f64)
    }
}

/// Parse `left,top,width,height` (also accepts `WxH+X+Y`).
impl FromStr for CaptureRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((size, offset)) = s.split_once('+') {
            let (w, h) = size
                .split_once('x')
                .ok_or_else(|| format!("invalid region '{s}': expected WxH+X+Y"))?;
            let (x, y) = offset
                .split_once('+')
                .ok_or_else(|| format!("invalid region '{s}': expected WxH+X+Y"))?;
            return Ok(Self::new(
                parse_num(x, s)?,
                parse_num(y, s)?,
                parse_num(w, s)?,
                parse_num(h, s)?,
            ));
        }

        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(format!(
                "invalid region '{s}': expected left,top,width,height"
            ));
        }
        Ok(Self::new(
            parse_num(parts[0], s)?,
            parse_num(parts[1], s)?,
            parse_num(parts[2], s)?,
            parse_num(parts[3], s)?,
        ))
    }
}

fn parse_num<T: FromStr>(part: &str, whole: &str) -> Result<T, String> {
    part.trim()
        .parse()
        .map_err(|_| format!("invalid number '{part}' in region '{whole}'"))
}

/// A point in device-space pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Center of a `width` x `height` frame.
    pub fn frame_center(width: u32, height: u32) -> Self {
        Self::new(width as f64 / 2.0, height as f64 / 2.0)
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_rounds_down() {
        let region = CaptureRegion::new(10, 20, 1281, 721).even();
        assert_eq!(region, CaptureRegion::new(10, 20, 1280, 720));
        assert_eq!(CaptureRegion::new(0, 0, 640, 480).even().width, 640);
    }

    #[test]
    fn test_parse_comma_form() {
        let region: CaptureRegion = "100, 50, 800, 600".parse().unwrap();
        assert_eq!(region, CaptureRegion::new(100, 50, 800, 600));
    }

    #[test]
    fn test_parse_geometry_form() {
        let region: CaptureRegion = "1280x720+0+0".parse().unwrap();
        assert_eq!(region, CaptureRegion::new(0, 0, 1280, 720));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("1,2,3".parse::<CaptureRegion>().is_err());
        assert!("a,b,c,d".parse::<CaptureRegion>().is_err());
    }

    #[test]
    fn test_to_local() {
        let region = CaptureRegion::new(100, 50, 800, 600);
        assert_eq!(region.to_local(500.0, 350.0), (400.0, 300.0));
    }

    #[test]
    fn test_frame_center() {
        let center = Point2D::frame_center(1280, 720);
        assert_eq!(center, Point2D::new(640.0, 360.0));
        assert!((center.distance(&Point2D::new(640.0, 0.0)) - 360.0).abs() < 1e-9);
    }
}
