//! Cancellable scheduled tasks driven by explicit `Instant`s.
//!
//! Nothing here spawns threads or sleeps; owners poll with the current time
//! and drop or cancel a task to dispose of it.

use log::debug;
use std::time::{Duration, Instant};

/// One-shot countdown with a whole-second visible tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    started_at: Instant,
    deadline: Instant,
}

impl Countdown {
    #[must_use]
    pub fn start(now: Instant, length: Duration) -> Self {
        Self {
            started_at: now,
            deadline: now + length,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// The deadline has been reached
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Seconds left, rounded up, as shown to the user; `None` once due
    #[must_use]
    pub fn remaining_secs(&self, now: Instant) -> Option<u64> {
        let left = self.deadline.saturating_duration_since(now);
        if left.is_zero() {
            return None;
        }
        let whole = left.as_secs();
        Some(if left.subsec_nanos() > 0 { whole + 1 } else { whole })
    }
}

/// Fixed-interval task that never overlaps a still-running invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicTask {
    interval: Duration,
    last_run: Option<Instant>,
    busy: bool,
}

impl PeriodicTask {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
            busy: false,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn last_run(&self) -> Option<Instant> {
        self.last_run
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// The interval has elapsed since the last run and no run is in flight
    #[must_use]
    pub fn due(&self, now: Instant) -> bool {
        !self.busy && self.last_run.map_or(true, |last| now >= last + self.interval)
    }

    /// Mark a run as started; returns `false` (skip) when one is still in flight
    pub fn begin(&mut self, now: Instant) -> bool {
        if self.busy {
            debug!("Periodic task still running, skipping");
            return false;
        }
        self.busy = true;
        self.last_run = Some(now);
        true
    }

    pub fn finish(&mut self) {
        self.busy = false;
    }

    /// Run `task` if due, returning its output
    pub fn run_if_due<T, F: FnOnce() -> T>(&mut self, now: Instant, task: F) -> Option<T> {
        if !self.due(now) || !self.begin(now) {
            return None;
        }
        let output = task();
        self.finish();
        Some(output)
    }

    /// Forget the schedule; the next poll runs immediately
    pub fn cancel(&mut self) {
        self.last_run = None;
        self.busy = false;
    }
}
