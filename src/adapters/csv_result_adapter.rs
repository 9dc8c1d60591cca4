//! CSV writer for run output.
//!
//! Writes `result.csv`, `equity.csv`, `orders.csv` and `signals.csv` into an
//! output directory. Files are rewritten on every run.

use crate::domain::error::PerptraderError;
use crate::domain::metrics::BacktestResult;
use crate::domain::position::OrderRecord;
use crate::domain::run_state::EquityPoint;
use crate::domain::signal::SignalRecord;
use crate::ports::result_port::ResultPort;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const RESULT_FILE: &str = "result.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const ORDERS_FILE: &str = "orders.csv";
pub const SIGNALS_FILE: &str = "signals.csv";

pub struct CsvResultAdapter {
    output_dir: PathBuf,
}

impl CsvResultAdapter {
    /// Creates the output directory if needed.
    pub fn new(output_dir: PathBuf) -> Result<Self, PerptraderError> {
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

/// Serializes `records` with a header row to `path`.
pub fn write_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<(), PerptraderError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

impl ResultPort for CsvResultAdapter {
    fn write_result(&self, result: &BacktestResult) -> Result<(), PerptraderError> {
        write_csv(&self.path_for(RESULT_FILE), std::slice::from_ref(result))
    }

    fn write_equity_curve(&self, curve: &[EquityPoint]) -> Result<(), PerptraderError> {
        write_csv(&self.path_for(EQUITY_FILE), curve)
    }

    fn write_orders(&self, orders: &[OrderRecord]) -> Result<(), PerptraderError> {
        write_csv(&self.path_for(ORDERS_FILE), orders)
    }

    fn write_signals(&self, signals: &[SignalRecord]) -> Result<(), PerptraderError> {
        write_csv(&self.path_for(SIGNALS_FILE), signals)
    }
}
