use super::SignalFilter;
use std::collections::VecDeque;

/// Moving average filter over the most recent `window_size` values
pub struct MovingAverageFilter {
    window_size: usize,
    buffer: VecDeque<f64>,
}

impl MovingAverageFilter {
    /// Create a new moving average filter
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        assert!(window_size > 0, "Window size must be greater than 0");
        Self {
            window_size,
            buffer: VecDeque::with_capacity(window_size),
        }
    }

    /// Configured window size
    #[must_use]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of values currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no value has been pushed since creation or the last reset
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl SignalFilter for MovingAverageFilter {
    fn apply(&mut self, value: f64) -> f64 {
        if self.buffer.len() >= self.window_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);

        self.buffer.iter().sum::<f64>() / self.buffer.len() as f64
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn name(&self) -> &str {
        "MovingAverageFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average() {
        let mut filter = MovingAverageFilter::new(3);

        assert_eq!(filter.apply(10.0), 10.0);
        assert_eq!(filter.apply(20.0), 15.0);
        assert_eq!(filter.apply(30.0), 20.0);

        // Window is full, oldest value should be dropped
        assert_eq!(filter.apply(40.0), 30.0);
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn test_reset_clears_window() {
        let mut filter = MovingAverageFilter::new(5);
        filter.apply(100.0);
        filter.apply(50.0);
        filter.reset();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(7.0), 7.0);
    }

    #[test]
    #[should_panic(expected = "Window size must be greater than 0")]
    fn test_zero_window_panics() {
        let _ = MovingAverageFilter::new(0);
    }
}
