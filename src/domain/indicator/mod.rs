//! Technical indicators used by the signal rules.
//!
//! Every indicator is a streaming accumulator with an `update(close)` method
//! returning `None` until its window has filled. [`IndicatorEngine`] bundles
//! the five series the strategy reads and produces one [`IndicatorRow`] per bar.

pub mod bollinger;
pub mod ema;
pub mod envelope;
pub mod rsi;
pub mod sma;

use chrono::{DateTime, Utc};

use self::bollinger::Bollinger;
use self::envelope::Envelope;
use self::rsi::Rsi;
use self::sma::Sma;
use super::ohlcv::Bar;

/// Upper/middle/lower band triple shared by Bollinger and Envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub rsi_fast_length: usize,
    pub rsi_slow_length: usize,
    pub bollinger_length: usize,
    pub bollinger_factor: f64,
    pub envelope_length: usize,
    pub envelope_percent: f64,
    pub sma_length: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            rsi_fast_length: 7,
            rsi_slow_length: 14,
            bollinger_length: 20,
            bollinger_factor: 0.4,
            envelope_length: 20,
            envelope_percent: 0.0015,
            sma_length: 10,
        }
    }
}

impl IndicatorConfig {
    /// Number of leading bars after which every series is defined.
    pub fn warmup_bars(&self) -> usize {
        [
            self.rsi_fast_length + 1,
            self.rsi_slow_length + 1,
            self.bollinger_length,
            self.envelope_length,
            self.sma_length,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Indicator values for a single bar. `None` means "not yet available".
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub rsi_fast: Option<f64>,
    pub rsi_slow: Option<f64>,
    pub bollinger: Option<Bands>,
    pub envelope: Option<Bands>,
    pub sma: Option<f64>,
}

impl IndicatorRow {
    pub fn is_complete(&self) -> bool {
        self.rsi_fast.is_some()
            && self.rsi_slow.is_some()
            && self.bollinger.is_some()
            && self.envelope.is_some()
            && self.sma.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    rsi_fast: Rsi,
    rsi_slow: Rsi,
    bollinger: Bollinger,
    envelope: Envelope,
    sma: Sma,
}

impl IndicatorEngine {
    pub fn new(config: &IndicatorConfig) -> Self {
        IndicatorEngine {
            rsi_fast: Rsi::new(config.rsi_fast_length),
            rsi_slow: Rsi::new(config.rsi_slow_length),
            bollinger: Bollinger::new(config.bollinger_length, config.bollinger_factor),
            envelope: Envelope::new(config.envelope_length, config.envelope_percent),
            sma: Sma::new(config.sma_length),
        }
    }

    pub fn update(&mut self, bar: &Bar) -> IndicatorRow {
        let close = bar.close;
        IndicatorRow {
            timestamp: bar.timestamp,
            close,
            rsi_fast: self.rsi_fast.update(close),
            rsi_slow: self.rsi_slow.update(close),
            bollinger: self.bollinger.update(close),
            envelope: self.envelope.update(close),
            sma: self.sma.update(close),
        }
    }
}

pub fn compute_indicators(bars: &[Bar], config: &IndicatorConfig) -> Vec<IndicatorRow> {
    let mut engine = IndicatorEngine::new(config);
    bars.iter().map(|bar| engine.update(bar)).collect()
}
