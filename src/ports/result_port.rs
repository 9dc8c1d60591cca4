//! Run output persistence port trait.
//!
//! Called once after a replay finishes; nothing here feeds back into the
//! simulation.

use crate::domain::backtest::BacktestOutput;
use crate::domain::error::PerptraderError;
use crate::domain::metrics::BacktestResult;
use crate::domain::position::OrderRecord;
use crate::domain::run_state::EquityPoint;
use crate::domain::signal::SignalRecord;

pub trait ResultPort {
    fn write_result(&self, result: &BacktestResult) -> Result<(), PerptraderError>;

    fn write_equity_curve(&self, curve: &[EquityPoint]) -> Result<(), PerptraderError>;

    fn write_orders(&self, orders: &[OrderRecord]) -> Result<(), PerptraderError>;

    fn write_signals(&self, signals: &[SignalRecord]) -> Result<(), PerptraderError>;

    /// Default implementation: writes each part in turn.
    fn write_output(&self, output: &BacktestOutput) -> Result<(), PerptraderError> {
        self.write_signals(&output.signals)?;
        self.write_orders(&output.orders)?;
        self.write_equity_curve(&output.equity_curve)?;
        self.write_result(&output.result)
    }
}
