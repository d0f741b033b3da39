//! Configuration management for the capture flow

use crate::{
    constants::*,
    orientation::{OrientationSequence, OrientationTarget, PROFILE_NAMES},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete capture configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User-facing session settings
    pub session: SessionConfig,

    /// Pose smoothing
    pub smoothing: SmoothingConfig,

    /// Orientation sequence selection
    pub orientation: OrientationConfig,

    /// Capture timing
    pub timing: TimingConfig,

    /// Face quality thresholds
    pub quality: QualityConfig,

    /// Captured image encoding
    pub capture: CaptureConfig,
}

/// Session settings chosen at flow start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Identifier used to name the uploaded archive (e.g. a roll number)
    pub session_id: String,

    /// Run a second pass through the sequence without the accessory
    pub has_accessory_phase: bool,

    /// Accessory worn during the first pass, used in photo labels
    pub accessory_name: String,
}

/// Smoothing filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Filter type (`moving_average`, `exponential`, `none`)
    pub filter: String,

    /// Moving average window size
    pub window: usize,

    /// Exponential filter alpha value
    pub exponential_alpha: f64,
}

/// Orientation sequence selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Built-in profile name
    pub profile: String,

    /// Custom targets; overrides `profile` when non-empty
    pub custom: Vec<OrientationTarget>,

    /// Flip the pitch sign produced by landmark geometry
    pub invert_pitch: bool,

    /// Flip the yaw sign produced by landmark geometry
    pub invert_yaw: bool,
}

/// Capture timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum time between two accepted captures
    pub min_capture_interval_ms: u64,

    /// Dead time after a capture
    pub cooldown_ms: u64,

    /// Start with auto-capture enabled
    pub auto_capture: bool,

    /// Auto-capture countdown length
    pub auto_capture_delay_secs: f64,

    /// Period of the lighting/background pixel sampling task
    pub sample_interval_ms: u64,
}

/// Face quality gate thresholds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub occlusion: OcclusionConfig,
    pub lighting: LightingConfig,
    pub background: BackgroundConfig,
    pub distance: DistanceConfig,
}

/// Occlusion thresholds in normalized frame space
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionConfig {
    pub min_nose_chin: f64,
    pub min_eye_distance: f64,
}

/// Lighting check parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Average luma must exceed this value
    pub threshold: f64,

    /// Sample every n-th pixel along a row
    pub sample_stride: usize,

    /// Padding around the landmark bounding box, as a fraction of its size
    pub face_padding: f64,

    /// Faces smaller than this (downscaled pixels) are not measured
    pub min_face_px: f64,

    /// Scale applied to the frame before sampling
    pub downscale: f64,

    /// Landmarks are in mirrored display coordinates
    pub mirrored: bool,
}

/// Background whiteness parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Every channel average must reach this value
    pub threshold: f64,

    /// Offset of the sample blocks from the frame edges
    pub margin: u32,

    /// Side length of each square sample block
    pub block: u32,
}

/// Optional face distance check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    pub enabled: bool,
    pub min_cm: f64,
    pub max_cm: f64,
    pub focal_length: f64,
}

/// Captured photo encoding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// Crop side as a fraction of the frame width
    pub width_fraction: f64,

    /// Vertical position of the crop within the leftover height (0 = top)
    pub vertical_anchor: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            has_accessory_phase: false,
            accessory_name: "spectacles".to_string(),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            filter: "moving_average".to_string(),
            window: DEFAULT_SMOOTHING_WINDOW,
            exponential_alpha: DEFAULT_EXPONENTIAL_ALPHA,
        }
    }
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            profile: "standard".to_string(),
            custom: Vec::new(),
            invert_pitch: false,
            invert_yaw: false,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_capture_interval_ms: DEFAULT_MIN_CAPTURE_INTERVAL_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            auto_capture: false,
            auto_capture_delay_secs: DEFAULT_AUTO_CAPTURE_DELAY_SECS,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
        }
    }
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            min_nose_chin: DEFAULT_MIN_NOSE_CHIN,
            min_eye_distance: DEFAULT_MIN_EYE_DISTANCE,
        }
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LUMA_THRESHOLD,
            sample_stride: DEFAULT_LUMA_SAMPLE_STRIDE,
            face_padding: DEFAULT_FACE_PADDING,
            min_face_px: DEFAULT_MIN_FACE_PX,
            downscale: DEFAULT_LIGHTING_DOWNSCALE,
            mirrored: false,
        }
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_BACKGROUND_THRESHOLD,
            margin: DEFAULT_BACKGROUND_MARGIN,
            block: DEFAULT_BACKGROUND_BLOCK,
        }
    }
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_cm: DEFAULT_MIN_DISTANCE_CM,
            max_cm: DEFAULT_MAX_DISTANCE_CM,
            focal_length: DEFAULT_FOCAL_LENGTH,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            width_fraction: DEFAULT_CROP_WIDTH_FRACTION,
            vertical_anchor: DEFAULT_CROP_VERTICAL_ANCHOR,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn min_capture_interval(&self) -> Duration {
        Duration::from_millis(self.min_capture_interval_ms)
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the delay does not fit in a [`Duration`].
    pub fn auto_capture_delay(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.auto_capture_delay_secs.max(0.0))
            .map_err(|e| Error::ConfigError(format!("Invalid auto-capture delay: {e}")))
    }

    #[must_use]
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::ConfigError`] if it is not a valid configuration.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if serialization fails and
    /// [`Error::Io`] if the file cannot be written.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Smoothing filter spec string understood by [`crate::filters::create_filter`]
    #[must_use]
    pub fn filter_spec(&self) -> String {
        match self.smoothing.filter.to_lowercase().as_str() {
            "moving_average" | "movingaverage" => format!("moving_average:{}", self.smoothing.window),
            "exponential" => format!("exponential:{}", self.smoothing.exponential_alpha),
            other => other.to_string(),
        }
    }

    /// Resolve the active orientation sequence
    pub fn orientation_sequence(&self) -> Result<OrientationSequence> {
        if self.orientation.custom.is_empty() {
            OrientationSequence::profile(&self.orientation.profile)
        } else {
            OrientationSequence::new("custom", self.orientation.custom.clone())
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Validate smoothing parameters
        if self.smoothing.window == 0 {
            return Err(Error::ConfigError(
                "Smoothing window size must be greater than 0".to_string(),
            ));
        }
        if !(self.smoothing.exponential_alpha > 0.0 && self.smoothing.exponential_alpha <= 1.0) {
            return Err(Error::ConfigError(
                "Exponential alpha must be in (0, 1]".to_string(),
            ));
        }
        crate::filters::create_filter(&self.filter_spec())
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        // Validate orientation selection
        if self.orientation.custom.is_empty()
            && !PROFILE_NAMES.contains(&self.orientation.profile.to_lowercase().as_str())
        {
            return Err(Error::ConfigError(format!(
                "Unknown orientation profile: {}",
                self.orientation.profile
            )));
        }
        self.orientation_sequence()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        // Validate timing
        let delay = self.timing.auto_capture_delay_secs;
        if !(delay > 0.0 && delay <= MAX_AUTO_CAPTURE_DELAY_SECS) {
            return Err(Error::ConfigError(format!(
                "Auto-capture delay must be in (0, {MAX_AUTO_CAPTURE_DELAY_SECS}] seconds"
            )));
        }

        // Validate quality thresholds
        let lighting = &self.quality.lighting;
        if !(lighting.downscale > 0.0 && lighting.downscale <= 1.0) {
            return Err(Error::ConfigError(
                "Lighting downscale must be in (0, 1]".to_string(),
            ));
        }
        if lighting.sample_stride == 0 {
            return Err(Error::ConfigError(
                "Lighting sample stride must be greater than 0".to_string(),
            ));
        }
        if self.quality.background.block == 0 {
            return Err(Error::ConfigError(
                "Background sample block must be greater than 0".to_string(),
            ));
        }
        let distance = &self.quality.distance;
        if distance.min_cm > distance.max_cm {
            return Err(Error::ConfigError(format!(
                "Distance range is inverted: {} > {}",
                distance.min_cm, distance.max_cm
            )));
        }

        // Validate encoding
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(Error::ConfigError(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }
        if !(self.capture.width_fraction > 0.0 && self.capture.width_fraction <= 1.0) {
            return Err(Error::ConfigError(
                "Crop width fraction must be in (0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.capture.vertical_anchor) {
            return Err(Error::ConfigError(
                "Crop vertical anchor must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Pose Capture Configuration

# Session settings
session:
  session_id: "roll-0001"
  has_accessory_phase: false
  accessory_name: "spectacles"

# Pose smoothing
smoothing:
  filter: "moving_average"
  window: 5
  exponential_alpha: 0.5

# Orientation sequence (profiles: standard, basic)
orientation:
  profile: "standard"
  custom: []
  invert_pitch: false
  invert_yaw: false

# Capture timing
timing:
  min_capture_interval_ms: 3000
  cooldown_ms: 3000
  auto_capture: false
  auto_capture_delay_secs: 2.0
  sample_interval_ms: 1000

# Face quality gate
quality:
  occlusion:
    min_nose_chin: 0.08
    min_eye_distance: 0.07
  lighting:
    threshold: 120.0
    sample_stride: 4
    face_padding: 0.05
    min_face_px: 50.0
    downscale: 0.5
    mirrored: false
  background:
    threshold: 220.0
    margin: 10
    block: 20
  distance:
    enabled: false
    min_cm: 35.0
    max_cm: 80.0
    focal_length: 950.0

# Captured photo encoding
capture:
  jpeg_quality: 92
  width_fraction: 1.0
  vertical_anchor: 0.65
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.filter_spec(), "moving_average:5");
        assert_eq!(config.timing.cooldown(), Duration::from_millis(3000));
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.session_id, "roll-0001");
        assert_eq!(config.orientation_sequence().unwrap().len(), 5);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("session:\n  has_accessory_phase: true\n").unwrap();
        assert!(config.session.has_accessory_phase);
        assert_eq!(config.session.accessory_name, "spectacles");
        assert_eq!(config.smoothing.window, 5);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.smoothing.window = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.orientation.profile = "sideways".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.capture.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.quality.distance.min_cm = 90.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timing.auto_capture_delay_secs = 0.0;
        assert!(config.validate().is_err());

        for delay in [1e20, f64::INFINITY, f64::NAN] {
            let mut config = Config::default();
            config.timing.auto_capture_delay_secs = delay;
            assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
        }

        let mut config = Config::default();
        config.timing.auto_capture_delay_secs = MAX_AUTO_CAPTURE_DELAY_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversized_delay_is_reported() {
        let mut config = Config::default();
        config.timing.auto_capture_delay_secs = 1e20;
        assert!(matches!(config.timing.auto_capture_delay(), Err(Error::ConfigError(_))));
        config.timing.auto_capture_delay_secs = 2.5;
        assert_eq!(config.timing.auto_capture_delay().unwrap(), Duration::from_millis(2500));
    }

    #[test]
    fn test_custom_sequence_overrides_profile() {
        let yaml = r#"
orientation:
  profile: "unknown-but-ignored"
  custom:
    - name: "tilt"
      roll:
        min: !exclusive 5.0
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        let seq = config.orientation_sequence().unwrap();
        assert_eq!(seq.profile_name(), "custom");
        assert!(seq.classify(0, 0.0, 0.0, 6.0));
    }
}
