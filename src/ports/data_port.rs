//! Bar data access port trait.

use crate::domain::error::PerptraderError;
use crate::domain::ohlcv::Bar;
use chrono::{DateTime, Utc};

pub trait DataPort {
    /// Bars ordered by timestamp, optionally limited to an inclusive range.
    fn fetch_bars(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, PerptraderError>;

    /// First timestamp, last timestamp and bar count, or `None` when empty.
    fn get_data_range(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, PerptraderError>;
}
