//! Price bar representation and input validation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::PerptraderError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Bar {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    fn prices(&self) -> [(&'static str, f64); 4] {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ]
    }
}

/// Rejects series that are empty, not strictly increasing in time, or carry
/// non-finite or non-positive prices. Runs once, before any simulation.
pub fn validate_bars(bars: &[Bar]) -> Result<(), PerptraderError> {
    if bars.is_empty() {
        return Err(PerptraderError::EmptySeries);
    }

    for (index, bar) in bars.iter().enumerate() {
        for (field, value) in bar.prices() {
            if !value.is_finite() || value <= 0.0 {
                return Err(PerptraderError::InvalidPrice {
                    index,
                    field,
                    value,
                });
            }
        }

        if index > 0 {
            let previous = bars[index - 1].timestamp;
            if bar.timestamp <= previous {
                return Err(PerptraderError::NonMonotonicTimestamp {
                    index,
                    previous,
                    current: bar.timestamp,
                });
            }
        }
    }

    Ok(())
}
