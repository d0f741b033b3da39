use crate::{
    constants::{AVERAGE_IPD_MM, LEFT_IRIS_CENTER, RIGHT_IRIS_CENTER},
    landmarks::LandmarkSet,
    Error, Result,
};
use nalgebra::{distance, Point2};

/// Pixel distance between the iris centres, both axes scaled by the frame width
fn pixel_ipd(landmarks: &LandmarkSet, image_width: u32) -> Option<f64> {
    let right = landmarks.get(RIGHT_IRIS_CENTER)?;
    let left = landmarks.get(LEFT_IRIS_CENTER)?;
    let scale = f64::from(image_width);

    let d = distance(
        &Point2::new(right.x * scale, right.y * scale),
        &Point2::new(left.x * scale, left.y * scale),
    );
    (d.is_finite() && d > 0.0).then_some(d)
}

/// Estimated camera-to-face distance in centimetres.
///
/// Uses the pinhole relation `distance = IPD * focal / pixel_ipd` with an
/// average adult inter-pupillary distance. Returns `None` without iris
/// landmarks or when the iris centres coincide.
#[must_use]
pub fn estimate_distance_cm(landmarks: &LandmarkSet, image_width: u32, focal_length: f64) -> Option<f64> {
    let ipd = pixel_ipd(landmarks, image_width)?;
    let distance_mm = AVERAGE_IPD_MM * focal_length / ipd;
    Some(distance_mm / 10.0)
}

/// Derive the focal length from a frame taken at a known distance
///
/// # Errors
///
/// Returns [`Error::LandmarkError`] if the set lacks usable iris landmarks.
pub fn calibrate_focal_length(landmarks: &LandmarkSet, image_width: u32, known_distance_mm: f64) -> Result<f64> {
    let ipd = pixel_ipd(landmarks, image_width)
        .ok_or_else(|| Error::LandmarkError("Iris landmarks required for calibration".to_string()))?;
    Ok(ipd * known_distance_mm / AVERAGE_IPD_MM)
}
