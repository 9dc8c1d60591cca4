//! Envelope bands: SMA(n) shifted by a fixed fraction.
//!
//! upper = mid × (1 + pct), lower = mid × (1 - pct).

use super::Bands;
use super::sma::RollingWindow;

#[derive(Debug, Clone)]
pub struct Envelope {
    window: RollingWindow,
    percent: f64,
}

impl Envelope {
    pub fn new(period: usize, percent: f64) -> Self {
        Envelope {
            window: RollingWindow::new(period),
            percent,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<Bands> {
        self.window.push(close);
        let middle = self.window.mean()?;
        Some(Bands {
            upper: middle * (1.0 + self.percent),
            middle,
            lower: middle * (1.0 - self.percent),
        })
    }
}
