use crate::{
    config::LightingConfig,
    constants::{LUMA_B, LUMA_G, LUMA_R},
    landmarks::LandmarkSet,
    utils::{safe_cast::count_to_f64, safe_cast::f64_to_u32_clamp, PixelRect},
};
use image::RgbImage;

/// Result of sampling luma around the face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingReport {
    /// Average luma of the sampled pixels (0-255)
    pub luminance: f64,
    pub is_bright: bool,
    /// The face box was below the minimum size and was not measured
    pub face_too_small: bool,
    pub sampled_pixels: usize,
}

impl LightingReport {
    fn unmeasured(face_too_small: bool) -> Self {
        Self {
            luminance: 0.0,
            is_bright: false,
            face_too_small,
            sampled_pixels: 0,
        }
    }
}

/// Rec. 601 luma of an RGB pixel
#[must_use]
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    LUMA_R * f64::from(r) + LUMA_G * f64::from(g) + LUMA_B * f64::from(b)
}

/// Average luma in a padded box around all landmarks.
///
/// Geometry is computed on a virtual frame downscaled by `config.downscale`;
/// pixels are read from the full-resolution frame at the matching positions,
/// every `sample_stride`-th pixel along each row.
#[must_use]
pub fn measure_face_luminance(frame: &RgbImage, landmarks: &LandmarkSet, config: &LightingConfig) -> LightingReport {
    let (frame_width, frame_height) = frame.dimensions();
    let Some(bbox) = landmarks.bounding_box() else {
        return LightingReport::unmeasured(false);
    };

    let scale = config.downscale;
    let scaled_width = f64::from(frame_width) * scale;
    let scaled_height = f64::from(frame_height) * scale;

    let (min_x, max_x) = if config.mirrored {
        (scaled_width - bbox.max_x * scaled_width, scaled_width - bbox.min_x * scaled_width)
    } else {
        (bbox.min_x * scaled_width, bbox.max_x * scaled_width)
    };
    let min_y = bbox.min_y * scaled_height;
    let max_y = bbox.max_y * scaled_height;

    let width = max_x - min_x;
    let height = max_y - min_y;
    if !(width >= config.min_face_px && height >= config.min_face_px) {
        return LightingReport::unmeasured(true);
    }

    let pad_x = width * config.face_padding;
    let pad_y = height * config.face_padding;

    let scaled_frame_width = f64_to_u32_clamp(scaled_width.floor(), 0, frame_width);
    let scaled_frame_height = f64_to_u32_clamp(scaled_height.floor(), 0, frame_height);
    let Some(area) = PixelRect::clipped(
        min_x - pad_x,
        min_y - pad_y,
        width + 2.0 * pad_x,
        height + 2.0 * pad_y,
        scaled_frame_width,
        scaled_frame_height,
    ) else {
        return LightingReport::unmeasured(false);
    };

    let stride = config.sample_stride.max(1);
    let mut total = 0.0;
    let mut count = 0usize;
    for sy in area.y..area.y + area.height {
        let y = f64_to_u32_clamp(f64::from(sy) / scale, 0, frame_height - 1);
        for sx in (area.x..area.x + area.width).step_by(stride) {
            let x = f64_to_u32_clamp(f64::from(sx) / scale, 0, frame_width - 1);
            let [r, g, b] = frame.get_pixel(x, y).0;
            total += luma(r, g, b);
            count += 1;
        }
    }

    let luminance = if count == 0 { 0.0 } else { total / count_to_f64(count) };
    LightingReport {
        luminance,
        is_bright: luminance > config.threshold,
        face_too_small: false,
        sampled_pixels: count,
    }
}
