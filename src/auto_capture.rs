//! Auto-capture scheduler.
//!
//! While every gating condition holds continuously, a countdown runs and the
//! capture fires when it reaches zero. Conditions are re-checked at fire time;
//! any lapse cancels the countdown and the next one starts from the full delay.

use crate::{sequencer::CapturePhase, timers::Countdown};
use log::debug;
use std::time::{Duration, Instant};

/// Gating signals sampled at one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConditions {
    /// The sequencer can accept a capture at all (started, not complete)
    pub active: bool,
    pub aligned: bool,
    pub quality_passed: bool,
    pub cooling_down: bool,
    pub awaiting_phase_switch: bool,
    pub interval_elapsed: bool,
    /// Target the countdown is aimed at
    pub target_index: usize,
    pub phase: CapturePhase,
}

impl CaptureConditions {
    #[must_use]
    pub fn all_hold(&self) -> bool {
        self.active
            && self.aligned
            && self.quality_passed
            && !self.cooling_down
            && !self.awaiting_phase_switch
            && self.interval_elapsed
    }

    fn target(&self) -> (usize, CapturePhase) {
        (self.target_index, self.phase)
    }
}

/// What a poll decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Nothing running
    Idle,
    /// Countdown in progress
    Counting { remaining_secs: u64 },
    /// A running countdown was dropped
    Cancelled,
    /// Trigger the capture now
    Fire,
}

#[derive(Debug)]
pub struct AutoCaptureScheduler {
    enabled: bool,
    delay: Duration,
    countdown: Option<Countdown>,
    armed_for: Option<(usize, CapturePhase)>,
    visible: Option<u64>,
}

impl AutoCaptureScheduler {
    #[must_use]
    pub fn new(enabled: bool, delay: Duration) -> Self {
        Self {
            enabled,
            delay,
            countdown: None,
            armed_for: None,
            visible: None,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turn auto-capture on or off; disabling cancels a running countdown
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cancel();
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Seconds shown to the user, as of the last poll
    #[must_use]
    pub fn countdown(&self) -> Option<u64> {
        self.visible
    }

    #[must_use]
    pub fn is_counting(&self) -> bool {
        self.countdown.is_some()
    }

    /// Drop any running countdown. Safe to call repeatedly.
    pub fn cancel(&mut self) -> bool {
        self.visible = None;
        self.armed_for = None;
        self.countdown.take().is_some()
    }

    /// Advance the scheduler with the conditions observed at `now`
    pub fn poll(&mut self, now: Instant, conditions: &CaptureConditions) -> SchedulerEvent {
        if !self.enabled || !conditions.all_hold() {
            return if self.cancel() {
                debug!("Auto-capture countdown cancelled");
                SchedulerEvent::Cancelled
            } else {
                SchedulerEvent::Idle
            };
        }

        if self.armed_for != Some(conditions.target()) {
            if self.cancel() {
                debug!("Auto-capture target changed, restarting countdown");
            }
            self.countdown = Some(Countdown::start(now, self.delay));
            self.armed_for = Some(conditions.target());
            debug!("Auto-capture countdown started ({:.1}s)", self.delay.as_secs_f64());
        }

        let Some(countdown) = self.countdown else {
            return SchedulerEvent::Idle;
        };
        if countdown.is_due(now) {
            self.cancel();
            return SchedulerEvent::Fire;
        }

        let remaining_secs = countdown.remaining_secs(now).unwrap_or(0);
        self.visible = Some(remaining_secs);
        SchedulerEvent::Counting { remaining_secs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(target_index: usize) -> CaptureConditions {
        CaptureConditions {
            active: true,
            aligned: true,
            quality_passed: true,
            cooling_down: false,
            awaiting_phase_switch: false,
            interval_elapsed: true,
            target_index,
            phase: CapturePhase::Primary,
        }
    }

    #[test]
    fn test_fires_after_delay() {
        let t0 = Instant::now();
        let mut scheduler = AutoCaptureScheduler::new(true, Duration::from_secs(2));
        assert_eq!(scheduler.poll(t0, &ready(0)), SchedulerEvent::Counting { remaining_secs: 2 });
        assert_eq!(
            scheduler.poll(t0 + Duration::from_secs(1), &ready(0)),
            SchedulerEvent::Counting { remaining_secs: 1 }
        );
        assert_eq!(scheduler.countdown(), Some(1));
        assert_eq!(scheduler.poll(t0 + Duration::from_secs(2), &ready(0)), SchedulerEvent::Fire);
        assert_eq!(scheduler.countdown(), None);
    }

    #[test]
    fn test_lost_alignment_cancels() {
        let t0 = Instant::now();
        let mut scheduler = AutoCaptureScheduler::new(true, Duration::from_secs(2));
        scheduler.poll(t0, &ready(0));

        let lost = CaptureConditions {
            aligned: false,
            ..ready(0)
        };
        assert_eq!(scheduler.poll(t0 + Duration::from_secs(1), &lost), SchedulerEvent::Cancelled);
        assert_eq!(scheduler.countdown(), None);
        assert_eq!(scheduler.poll(t0 + Duration::from_secs(2), &lost), SchedulerEvent::Idle);

        // Restarts from the full delay
        let t1 = t0 + Duration::from_millis(2500);
        assert_eq!(scheduler.poll(t1, &ready(0)), SchedulerEvent::Counting { remaining_secs: 2 });
        assert_ne!(scheduler.poll(t1 + Duration::from_secs(1), &ready(0)), SchedulerEvent::Fire);
    }

    #[test]
    fn test_target_change_restarts() {
        let t0 = Instant::now();
        let mut scheduler = AutoCaptureScheduler::new(true, Duration::from_secs(2));
        scheduler.poll(t0, &ready(0));
        let t1 = t0 + Duration::from_millis(1500);
        assert_eq!(scheduler.poll(t1, &ready(1)), SchedulerEvent::Counting { remaining_secs: 2 });
        assert_ne!(scheduler.poll(t0 + Duration::from_secs(2), &ready(1)), SchedulerEvent::Fire);
        assert_eq!(scheduler.poll(t1 + Duration::from_secs(2), &ready(1)), SchedulerEvent::Fire);
    }

    #[test]
    fn test_disabled_never_counts() {
        let t0 = Instant::now();
        let mut scheduler = AutoCaptureScheduler::new(false, Duration::from_secs(2));
        assert_eq!(scheduler.poll(t0, &ready(0)), SchedulerEvent::Idle);
        assert_eq!(scheduler.poll(t0 + Duration::from_secs(5), &ready(0)), SchedulerEvent::Idle);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let t0 = Instant::now();
        let mut scheduler = AutoCaptureScheduler::new(true, Duration::from_secs(2));
        scheduler.poll(t0, &ready(0));
        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());
        assert!(!scheduler.is_counting());
    }

    #[test]
    fn test_disable_cancels_running_countdown() {
        let t0 = Instant::now();
        let mut scheduler = AutoCaptureScheduler::new(true, Duration::from_secs(2));
        scheduler.poll(t0, &ready(0));
        scheduler.set_enabled(false);
        assert!(!scheduler.is_counting());
        assert_eq!(scheduler.countdown(), None);
    }
}
