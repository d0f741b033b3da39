//! Constants used throughout the library

/// Number of points in a face mesh landmark set (without iris refinement)
pub const FACE_MESH_LANDMARKS: usize = 468;

/// Number of points in a face mesh landmark set with iris refinement
pub const REFINED_FACE_MESH_LANDMARKS: usize = 478;

/// Anatomical landmark indices
pub const NOSE_TIP: usize = 1;
pub const FOREHEAD_CENTER: usize = 10;
pub const UPPER_LIP: usize = 13;
pub const LOWER_LIP: usize = 14;
pub const RIGHT_EYE_OUTER: usize = 33;
pub const RIGHT_EYE_INNER: usize = 133;
pub const CHIN: usize = 152;
pub const LOWER_CHIN: usize = 199;
pub const RIGHT_CHEEK: usize = 234;
pub const LEFT_EYE_OUTER: usize = 263;
pub const LEFT_EYE_INNER: usize = 362;
pub const LEFT_CHEEK: usize = 454;
pub const RIGHT_IRIS_CENTER: usize = 468;
pub const LEFT_IRIS_CENTER: usize = 473;

/// Key points that must be present and in-frame for a trustworthy face
pub const KEY_LANDMARKS: [usize; 7] = [
    RIGHT_EYE_OUTER,
    RIGHT_EYE_INNER,
    LEFT_EYE_INNER,
    LEFT_EYE_OUTER,
    NOSE_TIP,
    UPPER_LIP,
    LOWER_LIP,
];

/// Default smoothing window
pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// Default exponential filter alpha
pub const DEFAULT_EXPONENTIAL_ALPHA: f64 = 0.5;

/// Capture timing defaults (milliseconds)
pub const DEFAULT_MIN_CAPTURE_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_COOLDOWN_MS: u64 = 3000;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;

/// Auto-capture countdown (seconds)
pub const DEFAULT_AUTO_CAPTURE_DELAY_SECS: f64 = 2.0;
pub const MAX_AUTO_CAPTURE_DELAY_SECS: f64 = 3600.0;

/// Occlusion thresholds in normalized frame space
pub const DEFAULT_MIN_NOSE_CHIN: f64 = 0.08;
pub const DEFAULT_MIN_EYE_DISTANCE: f64 = 0.07;

/// Lighting check defaults
pub const DEFAULT_LUMA_THRESHOLD: f64 = 120.0;
pub const DEFAULT_LUMA_SAMPLE_STRIDE: usize = 4;
pub const DEFAULT_FACE_PADDING: f64 = 0.05;
pub const DEFAULT_MIN_FACE_PX: f64 = 50.0;
pub const DEFAULT_LIGHTING_DOWNSCALE: f64 = 0.5;

/// Rec. 601 luma weights
pub const LUMA_R: f64 = 0.299;
pub const LUMA_G: f64 = 0.587;
pub const LUMA_B: f64 = 0.114;

/// Background whiteness defaults
pub const DEFAULT_BACKGROUND_THRESHOLD: f64 = 220.0;
pub const DEFAULT_BACKGROUND_MARGIN: u32 = 10;
pub const DEFAULT_BACKGROUND_BLOCK: u32 = 20;

/// Face distance estimation
pub const AVERAGE_IPD_MM: f64 = 63.0;
pub const DEFAULT_FOCAL_LENGTH: f64 = 950.0;
pub const DEFAULT_MIN_DISTANCE_CM: f64 = 35.0;
pub const DEFAULT_MAX_DISTANCE_CM: f64 = 80.0;

/// Capture encoding defaults
pub const DEFAULT_JPEG_QUALITY: u8 = 92;
pub const DEFAULT_CROP_WIDTH_FRACTION: f64 = 1.0;
pub const DEFAULT_CROP_VERTICAL_ANCHOR: f64 = 0.65;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
