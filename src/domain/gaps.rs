//! Data-quality scan for price jumps between consecutive bars.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ohlcv::Bar;

pub const DEFAULT_GAP_TOLERANCE: f64 = 0.001;

/// A bar whose open differs from the previous close by more than the
/// tolerance, relative to the previous close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gap {
    pub prev_timestamp: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub prev_close: f64,
    pub open: f64,
    pub relative_diff: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GapSummary {
    pub count: usize,
    pub max_relative_diff: f64,
    pub min_relative_diff: f64,
}

pub fn find_gaps(bars: &[Bar], tolerance: f64) -> Vec<Gap> {
    bars.windows(2)
        .filter_map(|w| {
            let (prev, bar) = (&w[0], &w[1]);
            if prev.close == 0.0 {
                return None;
            }
            let relative_diff = (bar.open - prev.close).abs() / prev.close.abs();
            (relative_diff > tolerance).then(|| Gap {
                prev_timestamp: prev.timestamp,
                timestamp: bar.timestamp,
                prev_close: prev.close,
                open: bar.open,
                relative_diff,
            })
        })
        .collect()
}

/// `None` when there are no gaps.
pub fn summarize_gaps(gaps: &[Gap]) -> Option<GapSummary> {
    let first = gaps.first()?.relative_diff;
    let (max, min) = gaps
        .iter()
        .map(|g| g.relative_diff)
        .fold((first, first), |(max, min), d| (max.max(d), min.min(d)));
    Some(GapSummary {
        count: gaps.len(),
        max_relative_diff: max,
        min_relative_diff: min,
    })
}
