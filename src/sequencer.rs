//! Capture sequencer: walks the orientation sequence, decides when a capture
//! is admissible and records photos.
//!
//! The sequencer owns all capture session state. It never reads the clock;
//! every time-dependent call takes the current `Instant`.

use crate::{
    config::Config,
    orientation::{OrientationSequence, OrientationTarget},
    quality::{QualityIssue, QualityVerdict},
    Error, Result,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Which pass through the sequence is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    /// First pass; the accessory is worn when an accessory phase is configured
    #[default]
    Primary,
    /// Second pass without the accessory
    Secondary,
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        })
    }
}

/// Observable sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Aligning,
    ReadyToCapture,
    Cooldown,
    /// First pass finished; waiting for the user to confirm the second pass
    PhaseComplete,
    SessionComplete,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Aligning => "aligning",
            Self::ReadyToCapture => "ready",
            Self::Cooldown => "cooldown",
            Self::PhaseComplete => "phase-complete",
            Self::SessionComplete => "complete",
        };
        f.pad(name)
    }
}

/// One captured photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    /// Target name plus phase suffix
    pub label: String,
    /// Encoded image payload
    pub image: Vec<u8>,
    pub phase: CapturePhase,
}

/// Why a capture trigger was not accepted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureRefusal {
    #[error("Capture session has not started")]
    NotStarted,

    #[error("{0}")]
    InvalidFace(QualityIssue),

    #[error("{0}")]
    QualityCheckFailed(QualityIssue),

    #[error("Face is not aligned with the current target")]
    NotAligned,

    #[error("Cooling down ({}ms remaining)", .remaining.as_millis())]
    CoolingDown { remaining: Duration },

    #[error("Too soon after the last capture ({}ms remaining)", .remaining.as_millis())]
    TooSoon { remaining: Duration },

    #[error("Confirm the next phase before capturing")]
    AwaitingPhaseSwitch,

    #[error("All photos have been captured")]
    SessionComplete,
}

impl CaptureRefusal {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InvalidFace(issue) | Self::QualityCheckFailed(issue) => issue.code(),
            Self::NotAligned => "not_aligned",
            Self::CoolingDown { .. } => "cooling_down",
            Self::TooSoon { .. } => "too_soon",
            Self::AwaitingPhaseSwitch => "awaiting_phase_switch",
            Self::SessionComplete => "session_complete",
        }
    }
}

/// Timing and labelling options
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerOptions {
    /// Dead time after every capture
    pub cooldown: Duration,
    /// Minimum spacing between two accepted captures
    pub min_capture_interval: Duration,
    /// Accessory worn in the primary phase; `Some` enables the second phase
    pub accessory: Option<String>,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SequencerOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            cooldown: config.timing.cooldown(),
            min_capture_interval: config.timing.min_capture_interval(),
            accessory: config
                .session
                .has_accessory_phase
                .then(|| config.session.accessory_name.clone()),
        }
    }
}

/// Outcome of an accepted capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReceipt {
    pub label: String,
    /// Position of the photo in [`CaptureSequencer::photos`]
    pub photo_index: usize,
    /// The capture overwrote an earlier photo
    pub replaced: bool,
    /// Target index after the capture was committed
    pub next_target: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Progress {
    target_index: usize,
    phase: CapturePhase,
    awaiting_phase_switch: bool,
    complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Retake {
    photo_index: usize,
    resume: Progress,
}

/// State machine over an orientation sequence
#[derive(Debug, Clone)]
pub struct CaptureSequencer {
    sequence: OrientationSequence,
    options: SequencerOptions,
    started: bool,
    progress: Progress,
    photos: Vec<PhotoRecord>,
    retake: Option<Retake>,
    last_capture: Option<Instant>,
    cooldown_until: Option<Instant>,
    aligned: bool,
    verdict: QualityVerdict,
}

impl CaptureSequencer {
    #[must_use]
    pub fn new(sequence: OrientationSequence, options: SequencerOptions) -> Self {
        Self {
            sequence,
            options,
            started: false,
            progress: Progress {
                target_index: 0,
                phase: CapturePhase::Primary,
                awaiting_phase_switch: false,
                complete: false,
            },
            photos: Vec::new(),
            retake: None,
            last_capture: None,
            cooldown_until: None,
            aligned: false,
            verdict: QualityVerdict::default(),
        }
    }

    /// Begin aligning for the first target; no-op when already started
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        info!(
            "Capture session started: {} targets, profile '{}'{}",
            self.sequence.len(),
            self.sequence.profile_name(),
            self.options
                .accessory
                .as_ref()
                .map(|a| format!(", two phases ({a})"))
                .unwrap_or_default()
        );
    }

    /// Discard all photos and return to `Idle`
    pub fn reset(&mut self) {
        *self = Self::new(self.sequence.clone(), self.options.clone());
        info!("Capture session reset");
    }

    /// Record the latest classifier and quality signals
    pub fn observe(&mut self, now: Instant, aligned: bool, verdict: &QualityVerdict) -> CaptureState {
        self.aligned = aligned;
        self.verdict.clone_from(verdict);
        self.state(now)
    }

    #[must_use]
    pub fn state(&self, now: Instant) -> CaptureState {
        if !self.started {
            CaptureState::Idle
        } else if self.retake.is_none() && self.progress.complete {
            CaptureState::SessionComplete
        } else if self.retake.is_none() && self.progress.awaiting_phase_switch {
            CaptureState::PhaseComplete
        } else if self.is_cooling_down(now) {
            CaptureState::Cooldown
        } else if self.aligned && self.verdict.passed() {
            CaptureState::ReadyToCapture
        } else {
            CaptureState::Aligning
        }
    }

    /// Decide whether a capture trigger at `now` would be accepted
    ///
    /// # Errors
    ///
    /// Returns the first applicable [`CaptureRefusal`].
    pub fn check_capture(&self, now: Instant) -> std::result::Result<(), CaptureRefusal> {
        if let Some(issue) = self.verdict.invalid_face_issue() {
            return Err(CaptureRefusal::InvalidFace(issue));
        }
        if !self.started {
            return Err(CaptureRefusal::NotStarted);
        }
        if self.retake.is_none() {
            if self.progress.complete {
                return Err(CaptureRefusal::SessionComplete);
            }
            if self.progress.awaiting_phase_switch {
                return Err(CaptureRefusal::AwaitingPhaseSwitch);
            }
        }
        if let Some(issue) = self.verdict.first_issue() {
            return Err(CaptureRefusal::QualityCheckFailed(issue));
        }
        if !self.aligned {
            return Err(CaptureRefusal::NotAligned);
        }
        if let Some(remaining) = self.cooldown_remaining(now) {
            return Err(CaptureRefusal::CoolingDown { remaining });
        }
        if let Some(remaining) = self.interval_remaining(now) {
            return Err(CaptureRefusal::TooSoon { remaining });
        }
        Ok(())
    }

    /// Accept a capture at `now`, producing the payload with `encode`.
    ///
    /// `encode` only runs once the capture is known to be admissible. If it
    /// fails, the sequencer is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureRefused`] when the trigger is not admissible,
    /// or the encoder's error.
    pub fn capture_with<F>(&mut self, now: Instant, encode: F) -> Result<CaptureReceipt>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        self.check_capture(now)?;
        let image = encode()?;

        let label = self.current_label();
        let record = PhotoRecord {
            label: label.clone(),
            image,
            phase: self.progress.phase,
        };

        let (photo_index, replaced) = match self.retake.take() {
            Some(retake) => {
                let slot = self.photos.get_mut(retake.photo_index).ok_or_else(|| {
                    Error::InvalidTransition(format!("Retake slot {} no longer exists", retake.photo_index))
                })?;
                *slot = record;
                self.progress = retake.resume;
                info!("Retook photo {} ({label})", retake.photo_index + 1);
                (retake.photo_index, true)
            }
            None => {
                self.photos.push(record);
                self.advance();
                (self.photos.len() - 1, false)
            }
        };

        self.last_capture = Some(now);
        self.cooldown_until = Some(now + self.options.cooldown);
        self.aligned = false;

        Ok(CaptureReceipt {
            label,
            photo_index,
            replaced,
            next_target: self.progress.target_index,
        })
    }

    fn advance(&mut self) {
        let next = self.progress.target_index + 1;
        if next < self.sequence.len() {
            self.progress.target_index = next;
            debug!("Advancing to target {next}");
        } else if self.options.accessory.is_some() && self.progress.phase == CapturePhase::Primary {
            self.progress.target_index = 0;
            self.progress.awaiting_phase_switch = true;
            info!("Primary phase complete; waiting for phase switch");
        } else {
            self.progress.complete = true;
            info!("Capture session complete with {} photos", self.photos.len());
        }
    }

    /// Start the secondary phase after the primary pass finished
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the sequencer is waiting
    /// for a phase switch.
    pub fn confirm_phase_switch(&mut self) -> Result<()> {
        if self.retake.is_some() || !self.progress.awaiting_phase_switch {
            return Err(Error::InvalidTransition(
                "No phase switch is pending".to_string(),
            ));
        }
        self.progress.awaiting_phase_switch = false;
        self.progress.phase = CapturePhase::Secondary;
        self.progress.target_index = 0;
        self.aligned = false;
        info!("Switched to {} phase", self.progress.phase);
        Ok(())
    }

    /// Re-enter alignment for an already captured photo.
    ///
    /// The target is recovered from the photo's label (falling back to the
    /// first target) and the phase from the photo. The next accepted capture
    /// overwrites that photo and restores the progress held before the retake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] before the session starts and
    /// [`Error::InvalidInput`] for an unknown photo index.
    pub fn begin_retake(&mut self, photo_index: usize) -> Result<()> {
        if !self.started {
            return Err(Error::InvalidTransition(
                "Cannot retake before the session starts".to_string(),
            ));
        }
        let photo = self
            .photos
            .get(photo_index)
            .ok_or_else(|| Error::InvalidInput(format!("No photo at index {photo_index}")))?;

        let resume = self.retake.map_or(self.progress, |r| r.resume);
        let target_index = self.sequence.position_for_label(&photo.label).unwrap_or(0);

        self.progress = Progress {
            target_index,
            phase: photo.phase,
            awaiting_phase_switch: false,
            complete: false,
        };
        self.retake = Some(Retake { photo_index, resume });
        self.aligned = false;
        info!("Retaking photo {} ({})", photo_index + 1, photo.label);
        Ok(())
    }

    /// Leave retake mode without capturing; returns whether a retake was active
    pub fn cancel_retake(&mut self) -> bool {
        match self.retake.take() {
            Some(retake) => {
                self.progress = retake.resume;
                self.aligned = false;
                debug!("Retake of photo {} cancelled", retake.photo_index + 1);
                true
            }
            None => false,
        }
    }

    /// Label the next capture will carry
    #[must_use]
    pub fn current_label(&self) -> String {
        let name = self.current_target().map_or("", |t| t.name.as_str());
        match (&self.options.accessory, self.progress.phase) {
            (None, _) => name.to_string(),
            (Some(accessory), CapturePhase::Primary) => format!("{name}_with_{accessory}"),
            (Some(accessory), CapturePhase::Secondary) => format!("{name}_without_{accessory}"),
        }
    }

    #[must_use]
    pub fn current_target(&self) -> Option<&OrientationTarget> {
        self.sequence.get(self.progress.target_index)
    }

    #[must_use]
    pub fn target_index(&self) -> usize {
        self.progress.target_index
    }

    #[must_use]
    pub fn phase(&self) -> CapturePhase {
        self.progress.phase
    }

    #[must_use]
    pub fn photos(&self) -> &[PhotoRecord] {
        &self.photos
    }

    #[must_use]
    pub fn sequence(&self) -> &OrientationSequence {
        &self.sequence
    }

    #[must_use]
    pub fn options(&self) -> &SequencerOptions {
        &self.options
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Every target has been captured in every phase
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress.complete
    }

    #[must_use]
    pub fn awaiting_phase_switch(&self) -> bool {
        self.retake.is_none() && self.progress.awaiting_phase_switch
    }

    /// Photo being retaken, if any
    #[must_use]
    pub fn retake_index(&self) -> Option<usize> {
        self.retake.map(|r| r.photo_index)
    }

    #[must_use]
    pub fn last_capture(&self) -> Option<Instant> {
        self.last_capture
    }

    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    #[must_use]
    pub fn verdict(&self) -> &QualityVerdict {
        &self.verdict
    }

    #[must_use]
    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.cooldown_remaining(now).is_some()
    }

    /// Time left in the post-capture cooldown
    #[must_use]
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown_until
            .map(|until| until.saturating_duration_since(now))
            .filter(|d| !d.is_zero())
    }

    /// Time left before the minimum capture interval has elapsed
    #[must_use]
    pub fn interval_remaining(&self, now: Instant) -> Option<Duration> {
        self.last_capture
            .map(|last| (last + self.options.min_capture_interval).saturating_duration_since(now))
            .filter(|d| !d.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequencer(accessory: Option<&str>) -> CaptureSequencer {
        let options = SequencerOptions {
            accessory: accessory.map(str::to_string),
            ..SequencerOptions::default()
        };
        let mut seq = CaptureSequencer::new(OrientationSequence::standard(), options);
        seq.start();
        seq
    }

    fn encode_ok() -> Result<Vec<u8>> {
        Ok(vec![0xFF, 0xD8])
    }

    fn capture(seq: &mut CaptureSequencer, now: Instant) -> Result<CaptureReceipt> {
        seq.observe(now, true, &QualityVerdict::passing());
        seq.capture_with(now, encode_ok)
    }

    #[test]
    fn test_idle_until_started() {
        let now = Instant::now();
        let mut seq = CaptureSequencer::new(OrientationSequence::standard(), SequencerOptions::default());
        assert_eq!(seq.state(now), CaptureState::Idle);
        seq.observe(now, true, &QualityVerdict::passing());
        assert_eq!(seq.check_capture(now), Err(CaptureRefusal::NotStarted));
        seq.start();
        assert_eq!(seq.state(now), CaptureState::ReadyToCapture);
    }

    #[test]
    fn test_aligning_until_both_signals_pass() {
        let now = Instant::now();
        let mut seq = sequencer(None);
        assert_eq!(seq.observe(now, false, &QualityVerdict::passing()), CaptureState::Aligning);
        let dark = QualityVerdict::from_issues(1, vec![QualityIssue::LowLight]);
        assert_eq!(seq.observe(now, true, &dark), CaptureState::Aligning);
        assert_eq!(
            seq.check_capture(now),
            Err(CaptureRefusal::QualityCheckFailed(QualityIssue::LowLight))
        );
        assert_eq!(seq.observe(now, true, &QualityVerdict::passing()), CaptureState::ReadyToCapture);
    }

    #[test]
    fn test_invalid_face_refused_first() {
        let now = Instant::now();
        let mut seq = sequencer(None);
        let occluded = QualityVerdict::from_issues(1, vec![QualityIssue::LowLight, QualityIssue::Occluded]);
        seq.observe(now, false, &occluded);
        let err = seq.capture_with(now, encode_ok).unwrap_err();
        assert!(matches!(
            err,
            Error::CaptureRefused(CaptureRefusal::InvalidFace(QualityIssue::Occluded))
        ));
        assert!(seq.photos().is_empty());
        assert_eq!(seq.target_index(), 0);
    }

    #[test]
    fn test_capture_advances_and_cools_down() {
        let t0 = Instant::now();
        let mut seq = sequencer(None);
        let receipt = capture(&mut seq, t0).unwrap();
        assert_eq!(receipt.label, "straight");
        assert_eq!(receipt.next_target, 1);
        assert!(!receipt.replaced);
        assert_eq!(seq.state(t0), CaptureState::Cooldown);

        let t1 = t0 + Duration::from_millis(2999);
        seq.observe(t1, true, &QualityVerdict::passing());
        assert!(matches!(seq.check_capture(t1), Err(CaptureRefusal::CoolingDown { .. })));

        let t2 = t0 + Duration::from_millis(3000);
        seq.observe(t2, true, &QualityVerdict::passing());
        assert_eq!(seq.check_capture(t2), Ok(()));
    }

    #[test]
    fn test_interval_gate_independent_of_cooldown() {
        let t0 = Instant::now();
        let options = SequencerOptions {
            cooldown: Duration::from_millis(500),
            min_capture_interval: Duration::from_millis(3000),
            accessory: None,
        };
        let mut seq = CaptureSequencer::new(OrientationSequence::standard(), options);
        seq.start();
        capture(&mut seq, t0).unwrap();

        let t1 = t0 + Duration::from_millis(1000);
        seq.observe(t1, true, &QualityVerdict::passing());
        assert!(matches!(seq.check_capture(t1), Err(CaptureRefusal::TooSoon { .. })));
    }

    #[test]
    fn test_capture_clears_alignment() {
        let t0 = Instant::now();
        let mut seq = sequencer(None);
        capture(&mut seq, t0).unwrap();
        assert!(!seq.is_aligned());
        let later = t0 + Duration::from_secs(10);
        assert_eq!(seq.check_capture(later), Err(CaptureRefusal::NotAligned));
    }

    #[test]
    fn test_encode_failure_leaves_state() {
        let now = Instant::now();
        let mut seq = sequencer(None);
        seq.observe(now, true, &QualityVerdict::passing());
        let err = seq
            .capture_with(now, || Err(Error::EncodingError("boom".to_string())))
            .unwrap_err();
        assert!(matches!(err, Error::EncodingError(_)));
        assert!(seq.photos().is_empty());
        assert_eq!(seq.target_index(), 0);
        assert_eq!(seq.state(now), CaptureState::ReadyToCapture);
    }

    #[test]
    fn test_accessory_labels_and_phase_switch() {
        let mut now = Instant::now();
        let mut seq = sequencer(Some("spectacles"));
        for _ in 0..5 {
            capture(&mut seq, now).unwrap();
            now += Duration::from_secs(4);
        }
        assert_eq!(seq.state(now), CaptureState::PhaseComplete);
        assert_eq!(seq.target_index(), 0);
        assert_eq!(seq.photos()[0].label, "straight_with_spectacles");
        assert_eq!(seq.check_capture(now), Err(CaptureRefusal::AwaitingPhaseSwitch));

        seq.confirm_phase_switch().unwrap();
        assert_eq!(seq.phase(), CapturePhase::Secondary);
        assert_eq!(seq.current_label(), "straight_without_spectacles");
        assert!(seq.confirm_phase_switch().is_err());
    }

    #[test]
    fn test_phase_switch_rejected_mid_sequence() {
        let mut seq = sequencer(Some("spectacles"));
        assert!(matches!(seq.confirm_phase_switch(), Err(Error::InvalidTransition(_))));
    }

    #[test]
    fn test_retake_mid_flow_resumes_progress() {
        let mut now = Instant::now();
        let mut seq = sequencer(None);
        for _ in 0..3 {
            capture(&mut seq, now).unwrap();
            now += Duration::from_secs(4);
        }
        assert_eq!(seq.target_index(), 3);

        seq.begin_retake(1).unwrap();
        assert_eq!(seq.retake_index(), Some(1));
        assert_eq!(seq.current_label(), "left");

        let receipt = capture(&mut seq, now).unwrap();
        assert!(receipt.replaced);
        assert_eq!(receipt.photo_index, 1);
        assert_eq!(seq.photos().len(), 3);
        assert_eq!(seq.target_index(), 3);
        assert_eq!(seq.retake_index(), None);
    }

    #[test]
    fn test_retake_in_secondary_phase_uses_photo_phase() {
        let mut now = Instant::now();
        let mut seq = sequencer(Some("spectacles"));
        for _ in 0..5 {
            capture(&mut seq, now).unwrap();
            now += Duration::from_secs(4);
        }
        seq.confirm_phase_switch().unwrap();
        capture(&mut seq, now).unwrap();
        now += Duration::from_secs(4);

        seq.begin_retake(2).unwrap();
        assert_eq!(seq.phase(), CapturePhase::Primary);
        assert_eq!(seq.current_label(), "right_with_spectacles");
        capture(&mut seq, now).unwrap();

        assert_eq!(seq.phase(), CapturePhase::Secondary);
        assert_eq!(seq.target_index(), 1);
    }

    #[test]
    fn test_cancel_retake_restores_completion() {
        let mut now = Instant::now();
        let mut seq = sequencer(None);
        for _ in 0..5 {
            capture(&mut seq, now).unwrap();
            now += Duration::from_secs(4);
        }
        assert_eq!(seq.state(now), CaptureState::SessionComplete);

        seq.begin_retake(4).unwrap();
        assert_eq!(seq.state(now), CaptureState::Aligning);
        assert!(seq.cancel_retake());
        assert!(!seq.cancel_retake());
        assert_eq!(seq.state(now), CaptureState::SessionComplete);
    }

    #[test]
    fn test_retake_rejects_unknown_photo() {
        let mut seq = sequencer(None);
        assert!(matches!(seq.begin_retake(0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_reset() {
        let now = Instant::now();
        let mut seq = sequencer(None);
        capture(&mut seq, now).unwrap();
        seq.reset();
        assert!(seq.photos().is_empty());
        assert_eq!(seq.state(now), CaptureState::Idle);
        assert_eq!(seq.last_capture(), None);
    }

    #[test]
    fn test_refusal_codes() {
        assert_eq!(CaptureRefusal::NotAligned.code(), "not_aligned");
        assert_eq!(CaptureRefusal::InvalidFace(QualityIssue::MultipleFaces).code(), "multiple_faces");
        let msg = CaptureRefusal::CoolingDown {
            remaining: Duration::from_millis(1200),
        }
        .to_string();
        assert!(msg.contains("1200ms"));
    }
}
