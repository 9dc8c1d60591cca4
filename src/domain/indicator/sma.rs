//! Rolling window statistics and Simple Moving Average.
//!
//! The window keeps its mean and sum of squared deviations up to date with a
//! windowed Welford update, so each bar costs O(1) regardless of the period.
//! A value is defined once `period` observations have been pushed; before
//! that every accessor returns `None`.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingWindow {
    period: usize,
    values: VecDeque<f64>,
    mean: f64,
    m2: f64,
}

impl RollingWindow {
    pub fn new(period: usize) -> Self {
        RollingWindow {
            period,
            values: VecDeque::with_capacity(period),
            mean: 0.0,
            m2: 0.0,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn is_full(&self) -> bool {
        self.period > 0 && self.values.len() == self.period
    }

    /// Pushes a value, evicting the oldest one once the window is full.
    /// Returns whether the window is full after the push.
    pub fn push(&mut self, value: f64) -> bool {
        if self.period == 0 {
            return false;
        }

        if self.values.len() == self.period {
            if let Some(old) = self.values.pop_front() {
                let n = self.period as f64;
                let old_mean = self.mean;
                self.mean += (value - old) / n;
                self.m2 += (value - old) * (value - self.mean + old - old_mean);
            }
        } else {
            let count = (self.values.len() + 1) as f64;
            let delta = value - self.mean;
            self.mean += delta / count;
            self.m2 += delta * (value - self.mean);
        }

        if self.m2 < 0.0 {
            self.m2 = 0.0;
        }

        self.values.push_back(value);
        self.is_full()
    }

    pub fn mean(&self) -> Option<f64> {
        self.is_full().then_some(self.mean)
    }

    /// Population standard deviation (divides by N, not N-1).
    pub fn population_stddev(&self) -> Option<f64> {
        self.is_full()
            .then(|| (self.m2 / self.period as f64).max(0.0).sqrt())
    }
}

/// Simple Moving Average over `period` closes.
#[derive(Debug, Clone)]
pub struct Sma {
    window: RollingWindow,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Sma {
            window: RollingWindow::new(period),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        self.window.push(close);
        self.window.mean()
    }
}
