//! Signal filtering algorithms for smoothing pose angles.
//!
//! Each filter smooths a single scalar stream. Pitch, yaw and roll each get
//! their own instance through [`PoseSmoother`], so no state is shared between
//! axes.

/// Moving average filter over a bounded window
pub mod moving_average;

/// Exponential filter for responsive smoothing
pub mod exponential;

use crate::pose_estimation::PoseAngles;
use crate::Result;

/// Trait for all scalar signal filters
pub trait SignalFilter: Send + Sync {
    /// Push a raw value and return the smoothed value
    fn apply(&mut self, value: f64) -> f64;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes values through unchanged
pub struct NoFilter;

impl SignalFilter for NoFilter {
    fn apply(&mut self, value: f64) -> f64 {
        value
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Create a filter by type name.
///
/// Accepts an optional parameter after a colon, e.g. `moving_average:7` or
/// `exponential:0.3`.
///
/// # Errors
///
/// Returns [`crate::Error::FilterError`] for unknown names or invalid parameters.
pub fn create_filter(filter_type: &str) -> Result<Box<dyn SignalFilter>> {
    let lowered = filter_type.to_lowercase();
    let (name, param) = match lowered.split_once(':') {
        Some((name, param)) => (name, Some(param)),
        None => (lowered.as_str(), None),
    };

    match name {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "moving_average" | "movingaverage" => {
            let window = match param {
                Some(p) => p
                    .parse::<usize>()
                    .map_err(|_| crate::Error::FilterError(format!("Invalid window size: {p}")))?,
                None => crate::constants::DEFAULT_SMOOTHING_WINDOW,
            };
            if window == 0 {
                return Err(crate::Error::FilterError(
                    "Window size must be greater than 0".to_string(),
                ));
            }
            Ok(Box::new(moving_average::MovingAverageFilter::new(window)))
        }
        "exponential" => {
            let alpha = match param {
                Some(p) => p
                    .parse::<f64>()
                    .map_err(|_| crate::Error::FilterError(format!("Invalid alpha: {p}")))?,
                None => crate::constants::DEFAULT_EXPONENTIAL_ALPHA,
            };
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(crate::Error::FilterError(format!(
                    "Alpha must be in (0, 1], got {alpha}"
                )));
            }
            Ok(Box::new(exponential::ExponentialFilter::new(alpha)))
        }
        _ => Err(crate::Error::FilterError(format!("Unknown filter type: {filter_type}"))),
    }
}

/// Three independent smoothers, one per pose axis
pub struct PoseSmoother {
    pitch: Box<dyn SignalFilter>,
    yaw: Box<dyn SignalFilter>,
    roll: Box<dyn SignalFilter>,
}

impl PoseSmoother {
    /// Create a smoother with a fresh filter of the given type per axis
    ///
    /// # Errors
    ///
    /// Returns an error if the filter type is unknown or its parameters are invalid.
    pub fn new(filter_type: &str) -> Result<Self> {
        Ok(Self {
            pitch: create_filter(filter_type)?,
            yaw: create_filter(filter_type)?,
            roll: create_filter(filter_type)?,
        })
    }

    /// Moving-average smoother with the given window on each axis
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero
    #[must_use]
    pub fn moving_average(window_size: usize) -> Self {
        Self {
            pitch: Box::new(moving_average::MovingAverageFilter::new(window_size)),
            yaw: Box::new(moving_average::MovingAverageFilter::new(window_size)),
            roll: Box::new(moving_average::MovingAverageFilter::new(window_size)),
        }
    }

    /// Smooth a raw angle triple.
    ///
    /// Non-finite raw angles are rejected so that a single degenerate frame
    /// cannot poison the window; `None` is returned in that case.
    pub fn smooth(&mut self, raw: PoseAngles) -> Option<PoseAngles> {
        if !raw.is_finite() {
            return None;
        }
        Some(PoseAngles {
            pitch: self.pitch.apply(raw.pitch),
            yaw: self.yaw.apply(raw.yaw),
            roll: self.roll.apply(raw.roll),
        })
    }

    /// Reset all three windows
    pub fn reset(&mut self) {
        self.pitch.reset();
        self.yaw.reset();
        self.roll.reset();
    }

    /// Name of the underlying filter
    pub fn name(&self) -> &str {
        self.pitch.name()
    }
}

impl Default for PoseSmoother {
    fn default() -> Self {
        Self::moving_average(crate::constants::DEFAULT_SMOOTHING_WINDOW)
    }
}
