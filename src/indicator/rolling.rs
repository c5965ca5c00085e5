use std::collections::VecDeque;

/// Fixed-size trailing window with running sum and sum of squares, so each
/// push is O(1).
///
/// Values are stored relative to the first finite value pushed. Prices in one
/// table sit close together, and the shift keeps `sum_of_squares - sum^2 / n`
/// from cancelling catastrophically.
///
/// NaN and infinite values stay out of the sums. While one is inside the
/// window both statistics are `None`; once it slides out they recover.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    size: usize,
    window: VecDeque<f64>,
    shift: Option<f64>,
    sum: f64,
    sum_of_squares: f64,
    non_finite: usize,
}

impl RollingWindow {
    pub fn new(size: usize) -> Self {
        debug_assert!(size > 0, "window size must be > 0");
        Self {
            size,
            window: VecDeque::with_capacity(size),
            shift: None,
            sum: 0.0,
            sum_of_squares: 0.0,
            non_finite: 0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.is_full()
            && let Some(old) = self.window.pop_front()
        {
            if old.is_finite() {
                self.sum -= old;
                self.sum_of_squares -= old * old;
            } else {
                self.non_finite -= 1;
            }
        }

        if !value.is_finite() {
            self.non_finite += 1;
            self.window.push_back(value);
            return;
        }

        let shift = *self.shift.get_or_insert(value);
        let value = value - shift;
        self.window.push_back(value);
        self.sum += value;
        self.sum_of_squares += value * value;
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.size
    }

    /// Full and free of non-finite values.
    fn is_ready(&self) -> bool {
        self.is_full() && self.non_finite == 0
    }

    /// Arithmetic mean once the window is full.
    pub fn mean(&self) -> Option<f64> {
        let shift = self.shift?;
        self.is_ready()
            .then(|| shift + self.sum / self.size as f64)
    }

    /// Sample variance (n - 1 denominator) once the window is full.
    pub fn sample_variance(&self) -> Option<f64> {
        if !self.is_ready() || self.size < 2 {
            return None;
        }
        let n = self.size as f64;
        let variance = (self.sum_of_squares - self.sum * self.sum / n) / (n - 1.0);
        // Rounding can leave a tiny negative on flat windows.
        Some(variance.max(0.0))
    }
}
