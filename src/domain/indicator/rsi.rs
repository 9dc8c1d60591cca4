//! RSI (Relative Strength Index).
//!
//! Gains and losses of the close-to-close delta are each smoothed with a
//! recursive exponential average (alpha = 1/n, started at the first delta),
//! not Wilder's running moving average. The first bar has no delta, so RSI(n)
//! is first defined at bar index n.
//!
//! Losses keep their sign (`min(delta, 0)`), so RS = avg_gain / avg_loss is
//! non-positive and RSI = 100 - 100 / (1 + RS) is not bounded to [0, 100].
//! If avg_loss == 0: RSI = 100. When avg_gain == |avg_loss| the denominator
//! is zero and the value follows f64 division (-inf, or NaN if both are 0
//! after rounding).

use super::ema::ExponentialAverage;

#[derive(Debug, Clone)]
pub struct Rsi {
    prev_close: Option<f64>,
    avg_gain: ExponentialAverage,
    avg_loss: ExponentialAverage,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Rsi {
            prev_close: None,
            avg_gain: ExponentialAverage::with_period(period),
            avg_loss: ExponentialAverage::with_period(period),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;
        let delta = close - prev;

        let gain = self.avg_gain.update(delta.max(0.0));
        let loss = self.avg_loss.update(delta.min(0.0));

        match (gain, loss) {
            (Some(gain), Some(loss)) => Some(rsi_from_averages(gain, loss)),
            _ => None,
        }
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
