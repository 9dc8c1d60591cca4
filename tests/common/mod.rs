#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use perptrader::domain::backtest::BacktestOutput;
use perptrader::domain::error::PerptraderError;
use perptrader::domain::metrics::BacktestResult;
pub use perptrader::domain::ohlcv::Bar;
use perptrader::domain::position::OrderRecord;
use perptrader::domain::run_state::EquityPoint;
use perptrader::domain::signal::SignalRecord;
use perptrader::ports::data_port::DataPort;
use perptrader::ports::result_port::ResultPort;
use std::cell::RefCell;

pub const BASE_EPOCH: i64 = 1_700_000_000;

pub fn minute(i: usize) -> DateTime<Utc> {
    Utc.timestamp_opt(BASE_EPOCH + i as i64 * 60, 0).unwrap()
}

pub fn make_bar(ts: DateTime<Utc>, close: f64) -> Bar {
    Bar::new(ts, close, close, close, close)
}

/// One bar per minute, open == close.
pub fn minute_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(minute(i), c))
        .collect()
}

/// Smooth oscillating series that produces crossovers with short lengths.
pub fn wave_prices(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            100.0 + (t * 0.35).sin() * 3.0 + (t * 0.045).cos() * 2.0
        })
        .collect()
}

pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("ts,open,high,low,close\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            b.timestamp.to_rfc3339(),
            b.open,
            b.high,
            b.low,
            b.close
        ));
    }
    out
}

pub struct MockDataPort {
    pub bars: Vec<Bar>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            bars: Vec::new(),
            error: None,
        }
    }

    pub fn with_bars(mut self, bars: Vec<Bar>) -> Self {
        self.bars = bars;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, PerptraderError> {
        if let Some(reason) = &self.error {
            return Err(PerptraderError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .bars
            .iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s))
            .filter(|b| end.is_none_or(|e| b.timestamp <= e))
            .cloned()
            .collect())
    }

    fn get_data_range(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, PerptraderError> {
        Ok(match (self.bars.first(), self.bars.last()) {
            (Some(f), Some(l)) => Some((f.timestamp, l.timestamp, self.bars.len())),
            _ => None,
        })
    }
}

/// Captures everything written through the result port.
#[derive(Default)]
pub struct RecordingResultPort {
    pub results: RefCell<Vec<BacktestResult>>,
    pub equity: RefCell<Vec<EquityPoint>>,
    pub orders: RefCell<Vec<OrderRecord>>,
    pub signals: RefCell<Vec<SignalRecord>>,
}

impl ResultPort for RecordingResultPort {
    fn write_result(&self, result: &BacktestResult) -> Result<(), PerptraderError> {
        self.results.borrow_mut().push(result.clone());
        Ok(())
    }

    fn write_equity_curve(&self, curve: &[EquityPoint]) -> Result<(), PerptraderError> {
        *self.equity.borrow_mut() = curve.to_vec();
        Ok(())
    }

    fn write_orders(&self, orders: &[OrderRecord]) -> Result<(), PerptraderError> {
        *self.orders.borrow_mut() = orders.to_vec();
        Ok(())
    }

    fn write_signals(&self, signals: &[SignalRecord]) -> Result<(), PerptraderError> {
        *self.signals.borrow_mut() = signals.to_vec();
        Ok(())
    }
}

pub fn realized_total(output: &BacktestOutput) -> f64 {
    output.orders.iter().map(|o| o.realized_pnl).sum()
}
