//! Per-run mutable state.
//!
//! A `RunState` is built fresh for every replay and owned by the driver for
//! the whole run; nothing in it is shared across runs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::position::{OrderRecord, Position};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    pub start_balance: f64,
    pub balance: f64,
    pub position: Option<Position>,
    pub peak_balance: f64,
    /// Percent, running maximum.
    pub max_drawdown: f64,
    pub cooldown: usize,
    pub last_funding_bucket: Option<i64>,
    pub funding_paid_total: f64,
    pub total_trades: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub equity_curve: Vec<EquityPoint>,
    pub orders: Vec<OrderRecord>,
    pub last_bar: Option<(DateTime<Utc>, f64)>,
}

impl RunState {
    pub fn new(starting_balance: f64) -> Self {
        RunState {
            start_balance: starting_balance,
            balance: starting_balance,
            position: None,
            peak_balance: starting_balance,
            max_drawdown: 0.0,
            cooldown: 0,
            last_funding_bucket: None,
            funding_paid_total: 0.0,
            total_trades: 0,
            long_trades: 0,
            short_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            equity_curve: Vec::new(),
            orders: Vec::new(),
            last_bar: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Signed quantity, 0.0 when flat.
    pub fn quantity(&self) -> f64 {
        self.position.as_ref().map_or(0.0, |p| p.quantity)
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.position.as_ref().map(|p| p.entry_price)
    }

    /// Balance plus unrealized PnL at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        match &self.position {
            Some(pos) => self.balance + pos.unrealized_pnl(price),
            None => self.balance,
        }
    }

    pub fn record_equity(&mut self, timestamp: DateTime<Utc>, price: f64) {
        let equity = self.equity(price);
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    pub fn record_order(&mut self, order: OrderRecord) {
        self.orders.push(order);
    }
}
