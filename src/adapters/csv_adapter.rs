//! CSV file bar data adapter.
//!
//! Expects a header row with at least `ts,open,high,low,close`; other columns
//! (volume, trades, ...) are ignored. `ts` may be RFC3339, `YYYY-MM-DD HH:MM:SS`
//! (taken as UTC) or integer epoch milliseconds.

use crate::domain::error::PerptraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct CsvRow {
    ts: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> Result<Vec<Bar>, PerptraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| PerptraderError::Data {
                reason: format!("failed to read {}: {}", self.path.display(), e),
            })?;

        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| PerptraderError::Data {
                reason: format!("{} row {}: {}", self.path.display(), line + 1, e),
            })?;
            let timestamp = parse_timestamp(&row.ts).ok_or_else(|| PerptraderError::Data {
                reason: format!("{} row {}: invalid timestamp '{}'", self.path.display(), line + 1, row.ts),
            })?;
            bars.push(Bar::new(timestamp, row.open, row.high, row.low, row.close));
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single();
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, PerptraderError> {
        let bars = self.read_all()?;
        Ok(bars
            .into_iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s))
            .filter(|b| end.is_none_or(|e| b.timestamp <= e))
            .collect())
    }

    fn get_data_range(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, PerptraderError> {
        let bars = self.read_all()?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
            _ => None,
        })
    }
}
