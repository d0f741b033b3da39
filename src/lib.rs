//! Guided head-orientation photo capture.
//!
//! This library drives a capture session in which a user turns their head
//! through a sequence of target poses (straight, left, right, up, down) and a
//! photo is taken for each one. It consumes face-mesh landmarks produced by an
//! external detector and provides:
//! - Pose angle extraction (pitch, yaw, roll) from landmark geometry
//! - Per-axis smoothing of the noisy per-frame angles
//! - Classification against a configurable orientation sequence
//! - A face quality gate (occlusion, face count, lighting, background)
//! - A capture sequencer with cooldowns, retakes and an optional second
//!   pass without an accessory such as spectacles
//! - Auto-capture countdowns, photo encoding and archive upload hooks
//!
//! The per-frame pipeline is:
//! 1. Landmarks from one frame feed both the pose estimator and the gate
//! 2. Raw angles are smoothed and classified against the current target
//! 3. The sequencer decides whether the frame is ready to capture
//! 4. The auto-capture scheduler optionally triggers the capture
//!
//! # Examples
//!
//! ## Driving a session from precomputed signals
//!
//! ```
//! use pose_capture::{
//!     capture_flow::{CaptureFlow, FrameSignals},
//!     config::Config,
//!     encoding::JpegEncoder,
//!     pose_estimation::PoseAngles,
//!     quality::QualityVerdict,
//!     sequencer::CaptureState,
//! };
//! use std::time::Instant;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::default();
//! config.session.session_id = "roll-0001".to_string();
//!
//! let mut flow = CaptureFlow::new(&config, JpegEncoder::default())?;
//! let now = Instant::now();
//! flow.start(now)?;
//!
//! let signals = FrameSignals {
//!     pose: Some(PoseAngles::new(0.0, 0.0, 0.0)),
//!     verdict: QualityVerdict::passing(),
//! };
//! let report = flow.apply_signals(now, signals, None)?;
//! assert_eq!(report.state, CaptureState::ReadyToCapture);
//!
//! let frame = image::RgbImage::from_pixel(640, 480, image::Rgb([255, 255, 255]));
//! let receipt = flow.capture_now(now, &frame)?;
//! assert_eq!(receipt.label, "straight");
//! # Ok(())
//! # }
//! ```
//!
//! ## Smoothing and classification
//!
//! ```
//! use pose_capture::{filters::PoseSmoother, orientation::OrientationSequence,
//!                    pose_estimation::PoseAngles};
//!
//! let mut smoother = PoseSmoother::moving_average(5);
//! let sequence = OrientationSequence::standard();
//!
//! let smoothed = smoother.smooth(PoseAngles::new(2.0, 30.0, 1.0)).unwrap();
//! assert!(sequence.classify(1, smoothed.yaw, smoothed.pitch, smoothed.roll));
//! ```

/// Signal filters for smoothing pose angles
pub mod filters;

/// Face-mesh landmark sets
pub mod landmarks;

/// Pitch, yaw and roll from landmark geometry
pub mod pose_estimation;

/// Target poses and orientation sequences
pub mod orientation;

/// Face quality gate
pub mod quality;

/// Capture session state machine
pub mod sequencer;

/// Cancellable countdown and periodic tasks
pub mod timers;

/// Auto-capture countdown scheduling
pub mod auto_capture;

/// Per-frame orchestration of a capture session
pub mod capture_flow;

/// Cropping and encoding captured frames
pub mod encoding;

/// Packaging and uploading captured photos
pub mod upload;

/// Utility functions for pixel geometry and checked casts
pub mod utils;

/// Error types and result handling
pub mod error;

/// Constants used throughout the library
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
