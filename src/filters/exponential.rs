use super::SignalFilter;

/// Exponential smoothing filter
pub struct ExponentialFilter {
    alpha: f64,
    last: Option<f64>,
}

impl ExponentialFilter {
    /// Create a new exponential filter
    ///
    /// # Panics
    ///
    /// Panics if `alpha` is not in (0, 1]
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "Alpha must be in (0, 1]");
        Self { alpha, last: None }
    }
}

impl SignalFilter for ExponentialFilter {
    fn apply(&mut self, value: f64) -> f64 {
        let filtered = match self.last {
            Some(last) => self.alpha * value + (1.0 - self.alpha) * last,
            None => value,
        };
        self.last = Some(filtered);
        filtered
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
