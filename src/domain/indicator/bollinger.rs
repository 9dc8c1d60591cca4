//! Bollinger Bands.
//!
//! - Middle: SMA over n closes
//! - Upper: Middle + factor × StdDev
//! - Lower: Middle - factor × StdDev
//!
//! StdDev is the population standard deviation (divides by N, not N-1).
//! Warmup: first (period-1) bars are undefined.

use super::Bands;
use super::sma::RollingWindow;

#[derive(Debug, Clone)]
pub struct Bollinger {
    window: RollingWindow,
    factor: f64,
}

impl Bollinger {
    pub fn new(period: usize, factor: f64) -> Self {
        Bollinger {
            window: RollingWindow::new(period),
            factor,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<Bands> {
        self.window.push(close);
        let middle = self.window.mean()?;
        let half_width = self.factor * self.window.population_stddev()?;
        Some(Bands {
            upper: middle + half_width,
            middle,
            lower: middle - half_width,
        })
    }
}
