//! Error types for the pose capture library.

use crate::sequencer::CaptureRefusal;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding or decoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// YAML (de)serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Zip archive could not be written
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Landmark set is malformed (wrong length, missing anatomical points)
    #[error("Landmark error: {0}")]
    LandmarkError(String),

    /// Filter initialization or processing error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Orientation sequence definition error
    #[error("Orientation sequence error: {0}")]
    SequenceError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A capture trigger was refused by the sequencer
    #[error("Capture refused: {0}")]
    CaptureRefused(#[from] CaptureRefusal),

    /// Requested state transition is not valid from the current state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Frame could not be cropped or encoded
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Archive packaging or transport failed
    #[error("Upload error: {0}")]
    UploadError(String),

    /// The capture flow was stopped and no longer accepts input
    #[error("Capture flow has been stopped")]
    FlowStopped,
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
