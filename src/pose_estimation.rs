use crate::{
    constants::{CHIN, FOREHEAD_CENTER, LEFT_CHEEK, LEFT_EYE_OUTER, NOSE_TIP, RIGHT_CHEEK, RIGHT_EYE_OUTER},
    landmarks::LandmarkSet,
    Result,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Head orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseAngles {
    /// Positive when looking down
    pub pitch: f64,
    /// Positive when turned towards the subject's left
    pub yaw: f64,
    /// Tilt of the eye line
    pub roll: f64,
}

impl PoseAngles {
    #[must_use]
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// All three angles are finite numbers
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.pitch.is_finite() && self.yaw.is_finite() && self.roll.is_finite()
    }
}

/// Angle in degrees between `v` and a unit `axis`.
///
/// A zero-length `v` yields NaN, which downstream classification treats as
/// "no match".
#[must_use]
pub fn angle_to_axis(v: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    let cos = v.dot(axis) / v.norm();
    cos.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Pitch from the forehead-to-chin vector against the vertical axis.
///
/// # Errors
///
/// Returns an error if a required landmark is missing.
pub fn calculate_pitch(landmarks: &LandmarkSet) -> Result<f64> {
    let forehead = landmarks.point(FOREHEAD_CENTER)?;
    let chin = landmarks.point(CHIN)?;
    let nose = landmarks.point(NOSE_TIP)?;

    let angle = angle_to_axis(&(chin - forehead), &Vector3::y());
    let mid_y = (forehead.y + chin.y) / 2.0;

    // Nose below the forehead-chin midpoint means looking down
    Ok(if nose.y > mid_y { angle } else { -angle })
}

/// Yaw from the cheek-to-cheek vector against the horizontal axis.
///
/// # Errors
///
/// Returns an error if a required landmark is missing.
pub fn calculate_yaw(landmarks: &LandmarkSet) -> Result<f64> {
    let right_cheek = landmarks.point(RIGHT_CHEEK)?;
    let left_cheek = landmarks.point(LEFT_CHEEK)?;
    let nose = landmarks.point(NOSE_TIP)?;

    let angle = angle_to_axis(&(left_cheek - right_cheek), &Vector3::x());
    let mid_x = (right_cheek.x + left_cheek.x) / 2.0;

    Ok(if nose.x < mid_x { -angle } else { angle })
}

/// Roll as the 2D tilt of the line between the outer eye corners.
///
/// # Errors
///
/// Returns an error if a required landmark is missing.
pub fn calculate_roll(landmarks: &LandmarkSet) -> Result<f64> {
    let right_eye = landmarks.point(RIGHT_EYE_OUTER)?;
    let left_eye = landmarks.point(LEFT_EYE_OUTER)?;

    let dx = left_eye.x - right_eye.x;
    let dy = left_eye.y - right_eye.y;
    Ok(dy.atan2(dx).to_degrees())
}

/// Extracts pose angles from landmark geometry.
///
/// The sign of pitch and yaw depends on how the detector's coordinate frame
/// relates to the orientation predicates in use; either axis can be flipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseEstimator {
    invert_pitch: bool,
    invert_yaw: bool,
}

impl PoseEstimator {
    #[must_use]
    pub fn new(invert_pitch: bool, invert_yaw: bool) -> Self {
        Self {
            invert_pitch,
            invert_yaw,
        }
    }

    /// Estimate raw (unsmoothed) pose angles for one frame
    ///
    /// # Errors
    ///
    /// Returns an error if a required landmark is missing.
    pub fn estimate(&self, landmarks: &LandmarkSet) -> Result<PoseAngles> {
        let pitch = calculate_pitch(landmarks)?;
        let yaw = calculate_yaw(landmarks)?;
        let roll = calculate_roll(landmarks)?;

        Ok(PoseAngles {
            pitch: if self.invert_pitch { -pitch } else { pitch },
            yaw: if self.invert_yaw { -yaw } else { yaw },
            roll,
        })
    }
}
