//! Position state machine.
//!
//! One signal per bar moves the run between Flat, Long and Short:
//! - Flat + signal enters a position sized at a fraction of the balance.
//! - A same-direction signal is ignored (no pyramiding).
//! - An opposite-direction signal closes the position without flipping and
//!   arms the cooldown.
//!
//! An active cooldown is decremented first and swallows the bar's signal.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::metrics::{record_close, update_drawdown};
use super::position::{OrderRecord, Position, Side};
use super::run_state::RunState;
use super::signal::{Direction, Signal};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionParams {
    pub position_size_fraction: f64,
    pub cooldown_bars: usize,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        ExecutionParams {
            position_size_fraction: 0.1,
            cooldown_bars: 1,
        }
    }
}

/// Outcome of feeding one bar's signal to the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    NoSignal,
    Cooldown,
    Entered { quantity: f64 },
    SameDirection,
    Closed { realized_pnl: f64 },
    /// Entry sizing produced no tradable quantity (non-positive balance).
    Rejected,
}

pub fn on_signal(
    state: &mut RunState,
    timestamp: DateTime<Utc>,
    price: f64,
    signal: Signal,
    params: &ExecutionParams,
) -> Transition {
    if state.cooldown > 0 {
        state.cooldown -= 1;
        return Transition::Cooldown;
    }

    let Some(direction) = signal.direction() else {
        return Transition::NoSignal;
    };

    match state.position.as_ref().map(Position::direction) {
        None => match enter_position(state, timestamp, price, direction, params.position_size_fraction) {
            Some(quantity) => Transition::Entered { quantity },
            None => Transition::Rejected,
        },
        Some(current) if current == direction => Transition::SameDirection,
        Some(_) => match close_position(state, timestamp, price) {
            Some(realized_pnl) => {
                state.cooldown = params.cooldown_bars;
                Transition::Closed { realized_pnl }
            }
            None => Transition::NoSignal,
        },
    }
}

/// Opens a position of `balance × fraction / price` units. Returns the
/// signed quantity, or `None` if the run is already positioned or the size
/// is not a positive finite number.
pub fn enter_position(
    state: &mut RunState,
    timestamp: DateTime<Utc>,
    price: f64,
    direction: Direction,
    fraction: f64,
) -> Option<f64> {
    if state.position.is_some() {
        return None;
    }

    let size = state.balance * fraction / price;
    if !size.is_finite() || size <= 0.0 {
        return None;
    }
    let quantity = size * direction.sign();

    state.position = Some(Position {
        quantity,
        entry_price: price,
        entry_time: timestamp,
    });
    state.total_trades += 1;
    match direction {
        Direction::Long => state.long_trades += 1,
        Direction::Short => state.short_trades += 1,
    }

    state.record_order(OrderRecord {
        timestamp,
        side: Side::opening(direction),
        fill_price: price,
        quantity,
        position_after: quantity,
        balance_after: state.balance,
        realized_pnl: 0.0,
    });

    debug!(%timestamp, price, quantity, "position opened");
    Some(quantity)
}

/// Closes the open position at `price`, crediting realized PnL to the
/// balance. Returns the realized PnL, or `None` when flat.
pub fn close_position(state: &mut RunState, timestamp: DateTime<Utc>, price: f64) -> Option<f64> {
    let position = state.position.take()?;
    let realized_pnl = position.unrealized_pnl(price);

    state.balance += realized_pnl;
    state.last_funding_bucket = None;
    record_close(state, realized_pnl);
    update_drawdown(state);

    state.record_order(OrderRecord {
        timestamp,
        side: Side::closing(position.direction()),
        fill_price: price,
        quantity: -position.quantity,
        position_after: 0.0,
        balance_after: state.balance,
        realized_pnl,
    });

    debug!(%timestamp, price, realized_pnl, balance = state.balance, "position closed");
    Some(realized_pnl)
}
