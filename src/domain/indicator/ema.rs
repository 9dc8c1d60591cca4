//! Recursive exponential average with a minimum observation count.
//!
//! y[0] = x[0], y[t] = alpha * x[t] + (1 - alpha) * y[t-1].
//! The recursion starts at the first observation; the value is reported only
//! once `min_periods` observations have been seen.

#[derive(Debug, Clone)]
pub struct ExponentialAverage {
    alpha: f64,
    min_periods: usize,
    observations: usize,
    value: Option<f64>,
}

impl ExponentialAverage {
    pub fn new(alpha: f64, min_periods: usize) -> Self {
        ExponentialAverage {
            alpha,
            min_periods,
            observations: 0,
            value: None,
        }
    }

    /// alpha = 1/period, defined after `period` observations.
    /// A zero period never produces a value.
    pub fn with_period(period: usize) -> Self {
        if period == 0 {
            return ExponentialAverage::new(0.0, usize::MAX);
        }
        ExponentialAverage::new(1.0 / period as f64, period)
    }

    pub fn update(&mut self, x: f64) -> Option<f64> {
        let next = match self.value {
            None => x,
            Some(prev) => self.alpha * x + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        self.observations = self.observations.saturating_add(1);
        self.current()
    }

    pub fn current(&self) -> Option<f64> {
        if self.observations >= self.min_periods {
            self.value
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn seeds_with_first_observation() {
        let mut ema = ExponentialAverage::new(0.5, 1);
        assert_eq!(ema.update(10.0), Some(10.0));
    }

    #[test]
    fn recursive_update() {
        let mut ema = ExponentialAverage::new(0.5, 1);
        ema.update(10.0);
        assert_abs_diff_eq!(ema.update(20.0).unwrap(), 15.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ema.update(40.0).unwrap(), 27.5, epsilon = 1e-12);
    }

    #[test]
    fn hidden_until_min_periods() {
        let mut ema = ExponentialAverage::with_period(3);
        assert_eq!(ema.update(1.0), None);
        assert_eq!(ema.update(2.0), None);
        let third = ema.update(3.0).unwrap();
        // alpha = 1/3: 1 -> 4/3 -> 4/3 * 2/3 + 1 = 17/9
        assert_abs_diff_eq!(third, 17.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn warmup_values_still_feed_the_recursion() {
        let mut seeded_late = ExponentialAverage::with_period(2);
        seeded_late.update(100.0);
        let v = seeded_late.update(0.0).unwrap();
        // not a simple-average seed: 0.5 * 0 + 0.5 * 100
        assert_abs_diff_eq!(v, 50.0, epsilon = 1e-12);
    }

    #[test]
    fn differs_from_running_moving_average() {
        // Wilder's RMA seeds with the mean of the first n values.
        let xs = [4.0, 0.0, 2.0, 6.0];
        let mut ema = ExponentialAverage::with_period(3);
        let mut last = None;
        for x in xs {
            last = ema.update(x);
        }
        let rma_seed: f64 = (4.0 + 0.0 + 2.0) / 3.0;
        let rma = (rma_seed * 2.0 + 6.0) / 3.0;
        assert!((last.unwrap() - rma).abs() > 1e-6);
    }

    #[test]
    fn zero_period_never_defined() {
        let mut ema = ExponentialAverage::with_period(0);
        for x in [1.0, 2.0, 3.0] {
            assert_eq!(ema.update(x), None);
        }
    }
}
