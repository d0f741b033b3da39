//! Face quality gate: per-frame validity checks that must all pass before a
//! photo may be taken.
//!
//! Landmark-only checks (face count, key-point integrity, occlusion) run on
//! every frame. Pixel checks (lighting, background) read the raw frame and
//! may be sampled less often; see [`FaceQualityGate::sample_pixels`].

pub mod background;
pub mod distance;
pub mod lighting;
pub mod occlusion;

pub use background::{measure_background, BackgroundReport};
pub use distance::{calibrate_focal_length, estimate_distance_cm};
pub use lighting::{luma, measure_face_luminance, LightingReport};
pub use occlusion::{measure_occlusion, OcclusionReport};

use crate::{config::QualityConfig, landmarks::LandmarkSet, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A distinguishable reason a frame failed the gate.
///
/// `Display` is the user-facing message; [`QualityIssue::code`] is a stable
/// machine-readable code (also the serde representation).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    #[error("No face detected")]
    NoFace,

    #[error("Multiple faces detected; ensure only one face is visible")]
    MultipleFaces,

    #[error("Face landmarks are incomplete; keep your whole face in view")]
    CorruptedLandmarks,

    #[error("Please remove obstructions from your face")]
    Occluded,

    #[error("Face too small to measure; move closer to the camera")]
    FaceTooSmall,

    #[error("Low lighting detected. Please move to a brighter area.")]
    LowLight,

    #[error("Background is not white enough")]
    BackgroundNotWhite,

    #[error("Camera frame unavailable")]
    FrameUnavailable,

    #[error("Face distance out of range; adjust your distance from the camera")]
    DistanceOutOfRange,
}

impl QualityIssue {
    /// Stable reason code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFace => "no_face",
            Self::MultipleFaces => "multiple_faces",
            Self::CorruptedLandmarks => "corrupted_landmarks",
            Self::Occluded => "occluded",
            Self::FaceTooSmall => "face_too_small",
            Self::LowLight => "low_light",
            Self::BackgroundNotWhite => "background_not_white",
            Self::FrameUnavailable => "frame_unavailable",
            Self::DistanceOutOfRange => "distance_out_of_range",
        }
    }

    /// Parse a reason code
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        [
            Self::NoFace,
            Self::MultipleFaces,
            Self::CorruptedLandmarks,
            Self::Occluded,
            Self::FaceTooSmall,
            Self::LowLight,
            Self::BackgroundNotWhite,
            Self::FrameUnavailable,
            Self::DistanceOutOfRange,
        ]
        .into_iter()
        .find(|issue| issue.code() == code)
    }

    /// Issues that make the detected face itself untrustworthy.
    ///
    /// A capture attempted under one of these is refused with its message
    /// before any other gate is considered.
    #[must_use]
    pub fn is_invalid_face(&self) -> bool {
        matches!(self, Self::MultipleFaces | Self::CorruptedLandmarks | Self::Occluded)
    }
}

/// Aggregated gate outcome for one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QualityVerdict {
    /// Every failed check, in evaluation order
    pub issues: Vec<QualityIssue>,
    pub face_count: usize,
    pub luminance: Option<f64>,
    pub background: Option<[f64; 3]>,
    pub distance_cm: Option<f64>,
}

impl QualityVerdict {
    /// A verdict for a single face with no failed checks
    #[must_use]
    pub fn passing() -> Self {
        Self {
            face_count: 1,
            ..Self::default()
        }
    }

    /// Build a verdict from externally determined issues
    #[must_use]
    pub fn from_issues(face_count: usize, issues: Vec<QualityIssue>) -> Self {
        Self {
            issues,
            face_count,
            ..Self::default()
        }
    }

    /// All checks passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.face_count == 1 && self.issues.is_empty()
    }

    /// No face-invalidating issue is present
    #[must_use]
    pub fn valid_face(&self) -> bool {
        self.invalid_face_issue().is_none()
    }

    /// First face-invalidating issue, if any
    #[must_use]
    pub fn invalid_face_issue(&self) -> Option<QualityIssue> {
        self.issues.iter().copied().find(QualityIssue::is_invalid_face)
    }

    /// First failed check
    #[must_use]
    pub fn first_issue(&self) -> Option<QualityIssue> {
        self.issues.first().copied().or_else(|| match self.face_count {
            0 => Some(QualityIssue::NoFace),
            1 => None,
            _ => Some(QualityIssue::MultipleFaces),
        })
    }

    /// User-facing messages, one per failed check
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }

    /// Reason codes, one per failed check
    #[must_use]
    pub fn codes(&self) -> Vec<&'static str> {
        self.issues.iter().map(QualityIssue::code).collect()
    }

    fn push(&mut self, issue: QualityIssue) {
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }
}

/// Inputs for one gate evaluation; landmarks and pixels come from the same frame
#[derive(Debug, Clone, Copy)]
pub struct FrameEvidence<'a> {
    pub faces: &'a [LandmarkSet],
    pub frame: Option<&'a RgbImage>,
}

/// Result of the pixel-reading checks, cached between periodic samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSample {
    pub lighting: LightingReport,
    /// `None` when the frame is too small to hold the sample blocks
    pub background: Option<BackgroundReport>,
    pub frame_width: u32,
}

/// Runs every quality check with one configuration
#[derive(Debug, Clone, Default)]
pub struct FaceQualityGate {
    config: QualityConfig,
}

impl FaceQualityGate {
    #[must_use]
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Exactly one face is required
    #[must_use]
    pub fn check_face_count(&self, count: usize) -> Option<QualityIssue> {
        match count {
            0 => Some(QualityIssue::NoFace),
            1 => None,
            _ => Some(QualityIssue::MultipleFaces),
        }
    }

    /// Key points must be finite and inside the frame
    #[must_use]
    pub fn check_landmark_integrity(&self, face: &LandmarkSet) -> Option<QualityIssue> {
        (!face.broken_key_points().is_empty()).then_some(QualityIssue::CorruptedLandmarks)
    }

    /// # Errors
    ///
    /// Returns an error if an occlusion landmark is missing.
    pub fn check_occlusion(&self, face: &LandmarkSet) -> Result<OcclusionReport> {
        measure_occlusion(face, &self.config.occlusion)
    }

    #[must_use]
    pub fn check_lighting(&self, frame: &RgbImage, face: &LandmarkSet) -> LightingReport {
        measure_face_luminance(frame, face, &self.config.lighting)
    }

    /// # Errors
    ///
    /// Returns an error if the frame is too small for the sample blocks.
    pub fn check_background(&self, frame: &RgbImage) -> Result<BackgroundReport> {
        measure_background(frame, &self.config.background)
    }

    /// Estimated distance and whether it lies in range; `None` when the
    /// check is disabled
    #[must_use]
    pub fn check_distance(&self, face: &LandmarkSet, frame_width: u32) -> Option<(Option<f64>, bool)> {
        let config = &self.config.distance;
        if !config.enabled {
            return None;
        }
        let estimate = estimate_distance_cm(face, frame_width, config.focal_length);
        let in_range = estimate.is_some_and(|d| d >= config.min_cm && d <= config.max_cm);
        Some((estimate, in_range))
    }

    /// Read the pixel checks for one face
    #[must_use]
    pub fn sample_pixels(&self, frame: &RgbImage, face: &LandmarkSet) -> PixelSample {
        PixelSample {
            lighting: self.check_lighting(frame, face),
            background: self.check_background(frame).ok(),
            frame_width: frame.width(),
        }
    }

    /// Evaluate every check against a single frame
    #[must_use]
    pub fn evaluate(&self, evidence: &FrameEvidence<'_>) -> QualityVerdict {
        let sample = match (evidence.faces, evidence.frame) {
            ([face], Some(frame)) => Some(self.sample_pixels(frame, face)),
            _ => None,
        };
        self.evaluate_with_sample(evidence.faces, sample.as_ref())
    }

    /// Evaluate landmark checks on `faces` and merge a previously taken pixel sample
    #[must_use]
    pub fn evaluate_with_sample(&self, faces: &[LandmarkSet], sample: Option<&PixelSample>) -> QualityVerdict {
        let mut verdict = QualityVerdict::from_issues(faces.len(), Vec::new());

        if let Some(issue) = self.check_face_count(faces.len()) {
            verdict.push(issue);
            return verdict;
        }
        let face = &faces[0];

        if let Some(issue) = self.check_landmark_integrity(face) {
            verdict.push(issue);
            return verdict;
        }

        match self.check_occlusion(face) {
            Ok(report) if report.occluded => verdict.push(QualityIssue::Occluded),
            Ok(_) => {}
            Err(_) => verdict.push(QualityIssue::CorruptedLandmarks),
        }

        let Some(sample) = sample else {
            verdict.push(QualityIssue::FrameUnavailable);
            return verdict;
        };

        if sample.lighting.face_too_small {
            verdict.push(QualityIssue::FaceTooSmall);
        } else {
            verdict.luminance = Some(sample.lighting.luminance);
            if !sample.lighting.is_bright {
                verdict.push(QualityIssue::LowLight);
            }
        }

        match sample.background {
            Some(report) => {
                verdict.background = Some(report.average);
                if !report.is_white {
                    verdict.push(QualityIssue::BackgroundNotWhite);
                }
            }
            None => verdict.push(QualityIssue::FrameUnavailable),
        }

        if let Some((estimate, in_range)) = self.check_distance(face, sample.frame_width) {
            verdict.distance_cm = estimate;
            match (estimate, in_range) {
                (None, _) => verdict.push(QualityIssue::FrameUnavailable),
                (Some(_), false) => verdict.push(QualityIssue::DistanceOutOfRange),
                (Some(_), true) => {}
            }
        }

        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_through_serde_names() {
        for code in [
            "no_face",
            "multiple_faces",
            "corrupted_landmarks",
            "occluded",
            "face_too_small",
            "low_light",
            "background_not_white",
            "frame_unavailable",
            "distance_out_of_range",
        ] {
            let issue = QualityIssue::from_code(code).unwrap();
            assert_eq!(issue.code(), code);
            let parsed: QualityIssue = serde_yaml::from_str(code).unwrap();
            assert_eq!(parsed, issue);
        }
        assert!(QualityIssue::from_code("blurry").is_none());
    }

    #[test]
    fn test_invalid_face_classification() {
        assert!(QualityIssue::Occluded.is_invalid_face());
        assert!(QualityIssue::MultipleFaces.is_invalid_face());
        assert!(!QualityIssue::LowLight.is_invalid_face());
        assert!(!QualityIssue::NoFace.is_invalid_face());
    }

    #[test]
    fn test_verdict_accessors() {
        assert!(QualityVerdict::passing().passed());

        let verdict = QualityVerdict::from_issues(1, vec![QualityIssue::LowLight, QualityIssue::Occluded]);
        assert!(!verdict.passed());
        assert!(!verdict.valid_face());
        assert_eq!(verdict.invalid_face_issue(), Some(QualityIssue::Occluded));
        assert_eq!(verdict.first_issue(), Some(QualityIssue::LowLight));
        assert_eq!(verdict.codes(), vec!["low_light", "occluded"]);
        assert_eq!(verdict.messages().len(), 2);
    }

    #[test]
    fn test_face_count() {
        let gate = FaceQualityGate::default();
        assert_eq!(gate.check_face_count(0), Some(QualityIssue::NoFace));
        assert_eq!(gate.check_face_count(1), None);
        assert_eq!(gate.check_face_count(3), Some(QualityIssue::MultipleFaces));

        let verdict = gate.evaluate(&FrameEvidence { faces: &[], frame: None });
        assert_eq!(verdict.issues, vec![QualityIssue::NoFace]);
        assert!(verdict.valid_face());
    }
}
