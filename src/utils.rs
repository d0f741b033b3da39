//! Utility functions for pixel-region geometry.

pub mod safe_cast;

use safe_cast::f64_to_u32_clamp;

/// Integer pixel rectangle, clamped to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// Convert a float rectangle to pixels, clipped to a `frame_width` x `frame_height` frame.
    ///
    /// Returns `None` when nothing of the rectangle lies inside the frame.
    #[must_use]
    pub fn clipped(x: f64, y: f64, width: f64, height: f64, frame_width: u32, frame_height: u32) -> Option<Self> {
        if frame_width == 0 || frame_height == 0 {
            return None;
        }
        let x0 = f64_to_u32_clamp(x.floor(), 0, frame_width);
        let y0 = f64_to_u32_clamp(y.floor(), 0, frame_height);
        let x1 = f64_to_u32_clamp((x + width).ceil(), 0, frame_width);
        let y1 = f64_to_u32_clamp((y + height).ceil(), 0, frame_height);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clipped_inside_frame() {
        let rect = PixelRect::clipped(10.0, 20.0, 30.0, 40.0, 200, 200).unwrap();
        assert_eq!(rect, PixelRect { x: 10, y: 20, width: 30, height: 40 });
        assert_eq!(rect.area(), 1200);
    }

    #[test]
    fn test_clipped_to_boundaries() {
        let rect = PixelRect::clipped(-15.0, -5.0, 50.0, 500.0, 100, 100).unwrap();
        assert_eq!(rect.x, 0);
        assert_eq!(rect.y, 0);
        assert_eq!(rect.width, 35);
        assert_eq!(rect.height, 100);
    }

    #[test]
    fn test_clipped_outside_frame() {
        assert!(PixelRect::clipped(150.0, 150.0, 10.0, 10.0, 100, 100).is_none());
        assert!(PixelRect::clipped(0.0, 0.0, 10.0, 10.0, 0, 100).is_none());
        assert!(PixelRect::clipped(f64::NAN, 0.0, 10.0, 10.0, 100, 100).is_none());
    }
}
