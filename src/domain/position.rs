//! Open position and order audit records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::signal::Direction;

/// A single open perpetual position. Quantity is signed: >0 long, <0 short.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    pub fn direction(&self) -> Direction {
        if self.is_long() {
            Direction::Long
        } else {
            Direction::Short
        }
    }

    /// |qty| × price
    pub fn notional(&self, price: f64) -> f64 {
        self.quantity.abs() * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn opening(direction: Direction) -> Self {
        match direction {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    pub fn closing(direction: Direction) -> Self {
        match direction {
            Direction::Long => Side::Sell,
            Direction::Short => Side::Buy,
        }
    }
}

/// One fill in the append-only order log. `quantity` is the signed change
/// in position caused by the fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub fill_price: f64,
    pub quantity: f64,
    pub position_after: f64,
    pub balance_after: f64,
    pub realized_pnl: f64,
}
