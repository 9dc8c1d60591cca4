//! Periodic funding payments on an open perpetual position.
//!
//! Time is split into fixed buckets of `interval_hours` (epoch seconds divided
//! by the interval length). The first bar seen with a position open only
//! records its bucket. Every later bar that lands `missed >= 1` buckets ahead
//! is charged once for all of them:
//!
//! payment = -|qty| × price × rate × sign(qty) × missed
//!
//! so longs pay and shorts receive when the rate is positive.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::metrics::update_drawdown;
use super::run_state::RunState;

#[derive(Debug, Clone, PartialEq)]
pub struct FundingConfig {
    pub rate: f64,
    pub interval_hours: u32,
}

impl Default for FundingConfig {
    fn default() -> Self {
        FundingConfig {
            rate: 0.0001,
            interval_hours: 8,
        }
    }
}

impl FundingConfig {
    fn interval_seconds(&self) -> i64 {
        i64::from(self.interval_hours.max(1)) * 3600
    }
}

pub fn funding_bucket(timestamp: DateTime<Utc>, config: &FundingConfig) -> i64 {
    timestamp.timestamp().div_euclid(config.interval_seconds())
}

/// Charges any funding due at this bar. Returns the payment applied to the
/// balance, or `None` when nothing was charged.
pub fn apply_funding(
    state: &mut RunState,
    timestamp: DateTime<Utc>,
    price: f64,
    config: &FundingConfig,
) -> Option<f64> {
    let position = state.position.as_ref()?;
    let bucket = funding_bucket(timestamp, config);

    let Some(last) = state.last_funding_bucket else {
        state.last_funding_bucket = Some(bucket);
        return None;
    };

    let missed = bucket - last;
    if missed <= 0 {
        return None;
    }

    let per_interval = -position.notional(price) * config.rate * position.direction().sign();
    let payment = per_interval * missed as f64;

    state.balance += payment;
    state.funding_paid_total += payment;
    state.last_funding_bucket = Some(bucket);
    update_drawdown(state);

    debug!(%timestamp, missed, payment, balance = state.balance, "funding applied");
    Some(payment)
}
