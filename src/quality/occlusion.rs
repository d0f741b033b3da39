use crate::{
    config::OcclusionConfig,
    constants::{LEFT_EYE_INNER, LOWER_CHIN, NOSE_TIP, RIGHT_EYE_INNER},
    landmarks::LandmarkSet,
    Result,
};

/// Facial proportions used to detect obstruction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcclusionReport {
    /// Vertical nose-tip to lower-chin distance
    pub nose_chin: f64,
    /// Horizontal distance between the inner eye corners
    pub eye_distance: f64,
    pub occluded: bool,
}

/// Flag a face whose key proportions collapse below the configured minimums.
///
/// Covering the mouth or eyes, or a face too small or too rotated to trust,
/// shrinks these distances. Non-finite distances count as occluded.
///
/// # Errors
///
/// Returns an error if a required landmark is missing.
pub fn measure_occlusion(landmarks: &LandmarkSet, config: &OcclusionConfig) -> Result<OcclusionReport> {
    let nose = landmarks.point(NOSE_TIP)?;
    let chin = landmarks.point(LOWER_CHIN)?;
    let right_eye = landmarks.point(RIGHT_EYE_INNER)?;
    let left_eye = landmarks.point(LEFT_EYE_INNER)?;

    let nose_chin = (nose.y - chin.y).abs();
    let eye_distance = (right_eye.x - left_eye.x).abs();

    let occluded = !(nose_chin >= config.min_nose_chin) || !(eye_distance >= config.min_eye_distance);

    Ok(OcclusionReport {
        nose_chin,
        eye_distance,
        occluded,
    })
}
