use crate::{
    config::BackgroundConfig,
    utils::safe_cast::count_to_f64,
    Error, Result,
};
use image::RgbImage;

/// Channel averages over the two upper corner blocks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundReport {
    /// Mean (R, G, B) across both sample blocks
    pub average: [f64; 3],
    pub is_white: bool,
}

/// Sample square blocks inset from the top-left and top-right corners and
/// require every channel average to reach the threshold.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the frame is too small to hold both
/// blocks at the configured margin.
pub fn measure_background(frame: &RgbImage, config: &BackgroundConfig) -> Result<BackgroundReport> {
    let (width, height) = frame.dimensions();
    let margin = config.margin;
    let block = config.block;

    let needed_width = block
        .checked_add(margin)
        .and_then(|v| v.checked_mul(2))
        .filter(|&v| block > 0 && v <= width);
    let needed_height = block.checked_add(margin).filter(|&v| v <= height);
    if needed_width.is_none() || needed_height.is_none() {
        return Err(Error::InvalidInput(format!(
            "Frame {width}x{height} too small for {block}px background blocks at {margin}px margin"
        )));
    }

    let left_x = margin;
    let right_x = width - margin - block;

    let mut sums = [0.0f64; 3];
    let mut count = 0usize;
    for x0 in [left_x, right_x] {
        for y in margin..margin + block {
            for x in x0..x0 + block {
                let pixel = frame.get_pixel(x, y).0;
                for (sum, channel) in sums.iter_mut().zip(pixel) {
                    *sum += f64::from(channel);
                }
                count += 1;
            }
        }
    }

    let n = count_to_f64(count);
    let average = sums.map(|s| s / n);
    let is_white = average.iter().all(|&c| c >= config.threshold);

    Ok(BackgroundReport { average, is_white })
}
