//! Capture output: cropping a raw frame and encoding the photo payload.

use crate::{
    config::CaptureConfig,
    utils::safe_cast::f64_to_u32_clamp,
    Error, Result,
};
use image::RgbImage;

/// Pixel region of a frame to keep in the photo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    #[must_use]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Square passport-style crop.
    ///
    /// The side is `width_fraction` of the frame width, capped to the smaller
    /// frame dimension. The square is centred horizontally and placed at
    /// `vertical_anchor` of the leftover height (0 = top, 1 = bottom).
    #[must_use]
    pub fn passport(width: u32, height: u32, width_fraction: f64, vertical_anchor: f64) -> Self {
        let limit = width.min(height);
        let side = f64_to_u32_clamp((f64::from(width) * width_fraction).round(), 1, limit.max(1)).min(limit);
        let x = (width - side) / 2;
        let y = f64_to_u32_clamp(
            (f64::from(height - side) * vertical_anchor.clamp(0.0, 1.0)).round(),
            0,
            height - side,
        );
        Self {
            x,
            y,
            width: side,
            height: side,
        }
    }

    /// Passport crop from capture settings
    #[must_use]
    pub fn from_config(width: u32, height: u32, config: &CaptureConfig) -> Self {
        Self::passport(width, height, config.width_fraction, config.vertical_anchor)
    }

    fn fits(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= height)
    }
}

/// Converts a raw frame and crop region into an encoded photo
pub trait FrameEncoder {
    /// # Errors
    ///
    /// Returns an error if the region lies outside the frame or encoding fails.
    fn encode(&self, frame: &RgbImage, region: CropRegion) -> Result<Vec<u8>>;
}

/// JPEG output at a fixed quality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// Quality is clamped to 1..=100
    #[must_use]
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    #[must_use]
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.jpeg_quality)
    }

    #[must_use]
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, frame: &RgbImage, region: CropRegion) -> Result<Vec<u8>> {
        let (width, height) = frame.dimensions();
        if !region.fits(width, height) {
            return Err(Error::EncodingError(format!(
                "Crop {}x{}+{}+{} outside {width}x{height} frame",
                region.width, region.height, region.x, region.y
            )));
        }

        let cropped = image::imageops::crop_imm(frame, region.x, region.y, region.width, region.height).to_image();

        let mut buf = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, self.quality);
        encoder.encode_image(&cropped)?;
        Ok(buf)
    }
}
