//! Per-frame orchestration of the capture session.
//!
//! Each frame's landmarks feed the pose classifier and the quality gate
//! together, the sequencer consumes both verdicts, and the auto-capture
//! scheduler may trigger a capture. All mutation happens on the caller's
//! thread; after [`CaptureFlow::stop`] every mutating call is rejected.

use crate::{
    auto_capture::{AutoCaptureScheduler, CaptureConditions, SchedulerEvent},
    config::{CaptureConfig, Config},
    encoding::{CropRegion, FrameEncoder},
    filters::PoseSmoother,
    landmarks::LandmarkSet,
    pose_estimation::{PoseAngles, PoseEstimator},
    quality::{FaceQualityGate, PixelSample, QualityIssue, QualityVerdict},
    sequencer::{CaptureReceipt, CaptureRefusal, CaptureSequencer, CaptureState, PhotoRecord, SequencerOptions},
    timers::PeriodicTask,
    upload::{ArchiveUploader, UploadProgress, UploadReceipt},
    Error, Result,
};
use image::RgbImage;
use log::{debug, info, warn};
use std::time::Instant;

/// Camera resource released when the flow stops
pub trait CameraHandle {
    fn release(&mut self);
}

/// Detector output and pixels for one camera frame
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub at: Instant,
    pub faces: &'a [LandmarkSet],
    pub frame: Option<&'a RgbImage>,
}

/// Already-evaluated signals for one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameSignals {
    /// Raw pose for the single detected face, if it could be measured
    pub pose: Option<PoseAngles>,
    pub verdict: QualityVerdict,
}

/// What happened on one frame or tick
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub state: CaptureState,
    pub target_index: usize,
    pub smoothed: Option<PoseAngles>,
    pub aligned: bool,
    pub verdict: QualityVerdict,
    pub auto: SchedulerEvent,
    /// Visible auto-capture countdown
    pub countdown: Option<u64>,
    pub captured: Option<CaptureReceipt>,
    pub refusal: Option<CaptureRefusal>,
    /// Encoding failure of an automatic capture
    pub capture_error: Option<String>,
}

/// Owns every per-session component and drives them from frame events
pub struct CaptureFlow<E: FrameEncoder> {
    session_id: String,
    estimator: PoseEstimator,
    smoother: PoseSmoother,
    gate: FaceQualityGate,
    sequencer: CaptureSequencer,
    scheduler: AutoCaptureScheduler,
    sampler: PeriodicTask,
    pixel_sample: Option<PixelSample>,
    capture: CaptureConfig,
    encoder: E,
    camera: Option<Box<dyn CameraHandle>>,
    smoothed: Option<PoseAngles>,
    active: bool,
}

impl<E: FrameEncoder> CaptureFlow<E> {
    /// Build a flow from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the configuration is invalid.
    pub fn new(config: &Config, encoder: E) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            session_id: config.session.session_id.clone(),
            estimator: PoseEstimator::new(config.orientation.invert_pitch, config.orientation.invert_yaw),
            smoother: PoseSmoother::new(&config.filter_spec())?,
            gate: FaceQualityGate::new(config.quality.clone()),
            sequencer: CaptureSequencer::new(config.orientation_sequence()?, SequencerOptions::from_config(config)),
            scheduler: AutoCaptureScheduler::new(config.timing.auto_capture, config.timing.auto_capture_delay()?),
            sampler: PeriodicTask::new(config.timing.sample_interval()),
            pixel_sample: None,
            capture: config.capture.clone(),
            encoder,
            camera: None,
            smoothed: None,
            active: true,
        })
    }

    /// Attach the camera handle released on [`CaptureFlow::stop`]
    #[must_use]
    pub fn with_camera(mut self, camera: Box<dyn CameraHandle>) -> Self {
        self.camera = Some(camera);
        self
    }

    fn ensure_active(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(Error::FlowStopped)
        }
    }

    /// Begin the session
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowStopped`] after teardown.
    pub fn start(&mut self, now: Instant) -> Result<CaptureState> {
        self.ensure_active()?;
        self.sequencer.start();
        Ok(self.sequencer.state(now))
    }

    /// Discard all photos and smoothing history, then start again
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowStopped`] after teardown.
    pub fn restart(&mut self, now: Instant) -> Result<CaptureState> {
        self.ensure_active()?;
        self.scheduler.cancel();
        self.sampler.cancel();
        self.pixel_sample = None;
        self.smoother.reset();
        self.smoothed = None;
        self.sequencer.reset();
        self.start(now)
    }

    /// Evaluate one camera frame.
    ///
    /// Landmarks from this frame alone are used for both the pose and the
    /// quality verdict. Pixel checks are refreshed at most once per sample
    /// interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowStopped`] after teardown. Per-frame measurement
    /// problems are reported in the verdict, never as errors.
    pub fn process_frame(&mut self, input: FrameInput<'_>) -> Result<FrameReport> {
        self.ensure_active()?;

        if input.faces.len() != 1 {
            // A sample belongs to the face it was taken from
            self.pixel_sample = None;
            self.sampler.cancel();
        } else if let ([face], Some(frame)) = (input.faces, input.frame) {
            let gate = &self.gate;
            if let Some(sample) = self.sampler.run_if_due(input.at, || gate.sample_pixels(frame, face)) {
                debug!(
                    "Pixel sample: luminance {:.1}, background {:?}",
                    sample.lighting.luminance,
                    sample.background.map(|b| b.average)
                );
                self.pixel_sample = Some(sample);
            }
        }

        let verdict = self.gate.evaluate_with_sample(input.faces, self.pixel_sample.as_ref());

        let pose = match input.faces {
            [face] if verdict.valid_face() => match self.estimator.estimate(face) {
                Ok(angles) => Some(angles),
                Err(e) => {
                    warn!("Pose estimation failed: {e}");
                    None
                }
            },
            _ => None,
        };

        self.apply_signals(input.at, FrameSignals { pose, verdict }, input.frame)
    }

    /// Apply externally evaluated signals for one frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowStopped`] after teardown.
    pub fn apply_signals(&mut self, now: Instant, signals: FrameSignals, frame: Option<&RgbImage>) -> Result<FrameReport> {
        self.ensure_active()?;

        let FrameSignals { pose, verdict } = signals;
        self.smoothed = match pose {
            Some(raw) if raw.is_finite() => self.smoother.smooth(raw),
            Some(raw) => {
                warn!("Non-finite pose angles {raw:?}; treating frame as not aligned");
                None
            }
            None => None,
        };

        let aligned = verdict.face_count == 1
            && self.smoothed.is_some_and(|s| {
                self.sequencer
                    .sequence()
                    .classify(self.sequencer.target_index(), s.yaw, s.pitch, s.roll)
            });

        let state = self.sequencer.observe(now, aligned, &verdict);
        if !verdict.issues.is_empty() {
            debug!("Quality issues: {}", verdict.codes().join(", "));
        }
        debug!("Frame: state {state}, target {}, aligned {aligned}", self.sequencer.target_index());

        let mut report = FrameReport {
            state,
            target_index: self.sequencer.target_index(),
            smoothed: self.smoothed,
            aligned,
            verdict,
            auto: SchedulerEvent::Idle,
            countdown: None,
            captured: None,
            refusal: None,
            capture_error: None,
        };
        self.drive_auto_capture(now, frame, &mut report);
        Ok(report)
    }

    /// Timer tick without a new frame: advances the auto-capture countdown
    /// using the most recent signals
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowStopped`] after teardown.
    pub fn tick(&mut self, now: Instant, frame: Option<&RgbImage>) -> Result<FrameReport> {
        self.ensure_active()?;
        let mut report = FrameReport {
            state: self.sequencer.state(now),
            target_index: self.sequencer.target_index(),
            smoothed: self.smoothed,
            aligned: self.sequencer.is_aligned(),
            verdict: self.sequencer.verdict().clone(),
            auto: SchedulerEvent::Idle,
            countdown: None,
            captured: None,
            refusal: None,
            capture_error: None,
        };
        self.drive_auto_capture(now, frame, &mut report);
        Ok(report)
    }

    fn conditions(&self, now: Instant) -> CaptureConditions {
        let seq = &self.sequencer;
        CaptureConditions {
            active: seq.is_started() && (seq.retake_index().is_some() || !seq.is_complete()),
            aligned: seq.is_aligned(),
            quality_passed: seq.verdict().passed(),
            cooling_down: seq.is_cooling_down(now),
            awaiting_phase_switch: seq.awaiting_phase_switch(),
            interval_elapsed: seq.interval_remaining(now).is_none(),
            target_index: seq.target_index(),
            phase: seq.phase(),
        }
    }

    fn drive_auto_capture(&mut self, now: Instant, frame: Option<&RgbImage>, report: &mut FrameReport) {
        let conditions = self.conditions(now);
        report.auto = self.scheduler.poll(now, &conditions);

        if report.auto == SchedulerEvent::Fire {
            match frame {
                Some(frame) => match self.capture_frame(now, frame) {
                    Ok(receipt) => report.captured = Some(receipt),
                    Err(Error::CaptureRefused(refusal)) => report.refusal = Some(refusal),
                    Err(e) => {
                        warn!("Automatic capture failed: {e}");
                        report.capture_error = Some(e.to_string());
                    }
                },
                None => {
                    warn!("Auto-capture fired without a frame");
                    report.refusal = Some(CaptureRefusal::QualityCheckFailed(QualityIssue::FrameUnavailable));
                }
            }
        }

        report.countdown = self.scheduler.countdown();
        report.state = self.sequencer.state(now);
        report.target_index = self.sequencer.target_index();
    }

    fn capture_frame(&mut self, now: Instant, frame: &RgbImage) -> Result<CaptureReceipt> {
        let region = CropRegion::from_config(frame.width(), frame.height(), &self.capture);
        let encoder = &self.encoder;
        match self.sequencer.capture_with(now, || encoder.encode(frame, region)) {
            Ok(receipt) => {
                info!(
                    "Captured {} ({} of {})",
                    receipt.label,
                    receipt.photo_index + 1,
                    self.sequencer.photos().len()
                );
                Ok(receipt)
            }
            Err(e) => {
                if let Error::CaptureRefused(refusal) = &e {
                    warn!("Capture refused: {refusal} [{}]", refusal.code());
                }
                Err(e)
            }
        }
    }

    /// Manual capture trigger
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowStopped`] after teardown, [`Error::CaptureRefused`]
    /// when the capture is not admissible, or the encoder's error.
    pub fn capture_now(&mut self, now: Instant, frame: &RgbImage) -> Result<CaptureReceipt> {
        self.ensure_active()?;
        let receipt = self.capture_frame(now, frame)?;
        self.scheduler.cancel();
        Ok(receipt)
    }

    /// Start the secondary phase
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowStopped`] after teardown or
    /// [`Error::InvalidTransition`] when no phase switch is pending.
    pub fn confirm_phase_switch(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.scheduler.cancel();
        self.sequencer.confirm_phase_switch()
    }

    /// Retake an already captured photo
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowStopped`] after teardown or the sequencer's error.
    pub fn retake(&mut self, photo_index: usize) -> Result<()> {
        self.ensure_active()?;
        self.scheduler.cancel();
        self.sequencer.begin_retake(photo_index)
    }

    /// Abandon a retake in progress
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowStopped`] after teardown.
    pub fn cancel_retake(&mut self) -> Result<bool> {
        self.ensure_active()?;
        self.scheduler.cancel();
        Ok(self.sequencer.cancel_retake())
    }

    /// Toggle auto-capture
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowStopped`] after teardown.
    pub fn set_auto_capture(&mut self, enabled: bool) -> Result<()> {
        self.ensure_active()?;
        self.scheduler.set_enabled(enabled);
        info!("Auto-capture {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Tear down: cancel timers and release the camera. Idempotent.
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.scheduler.cancel();
        self.sampler.cancel();
        if let Some(mut camera) = self.camera.take() {
            camera.release();
        }
        info!("Capture flow stopped with {} photos", self.sequencer.photos().len());
    }

    /// Hand the captured photos to an uploader.
    ///
    /// Allowed after [`CaptureFlow::stop`]; the photo list is never modified,
    /// so a failed upload can be retried.
    ///
    /// # Errors
    ///
    /// Propagates the uploader's error.
    pub fn upload(
        &self,
        uploader: &mut dyn ArchiveUploader,
        progress: &mut dyn FnMut(UploadProgress),
    ) -> Result<UploadReceipt> {
        uploader
            .upload(&self.session_id, self.sequencer.photos(), progress)
            .map_err(|e| {
                warn!("Upload failed: {e}");
                e
            })
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn state(&self, now: Instant) -> CaptureState {
        self.sequencer.state(now)
    }

    #[must_use]
    pub fn sequencer(&self) -> &CaptureSequencer {
        &self.sequencer
    }

    #[must_use]
    pub fn photos(&self) -> &[PhotoRecord] {
        self.sequencer.photos()
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn auto_capture_enabled(&self) -> bool {
        self.scheduler.is_enabled()
    }

    /// Prompt for the current target
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.sequencer.current_target().map(|t| t.prompt.as_str())
    }
}
