//! Checked conversions between float geometry and pixel coordinates

use crate::{Error, Result};

/// Safely convert f64 to u32 with bounds checking
///
/// # Errors
///
/// Returns an error if the value is not finite or outside the u32 range
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Truncation after bounds check is safe
pub fn f64_to_u32(value: f64) -> Result<u32> {
    if value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX) {
        Ok(value as u32)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be safely converted to u32"
        )))
    }
}

/// Clamp and convert f64 to u32 for pixel coordinates
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamping ensures safe truncation
pub fn f64_to_u32_clamp(value: f64, min: u32, max: u32) -> u32 {
    // Ensure min <= max
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    let clamped = value.clamp(f64::from(min), f64::from(max));
    (clamped as u32).clamp(min, max)
}

/// Convert a pixel count to f64 for averaging
#[must_use]
#[allow(clippy::cast_precision_loss)] // Pixel counts stay far below 2^52
pub fn count_to_f64(count: usize) -> f64 {
    count as f64
}
