//! Backtest driver.
//!
//! A run is a sequential fold over the bars. For each bar, in order:
//! indicators → signal flags → funding → equity sample → cooldown/signal.
//! Once the stream ends any open position is force-closed at the last close
//! and the result is computed from the final state.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::error::PerptraderError;
use super::execution::{ExecutionParams, Transition, close_position, on_signal};
use super::funding::{FundingConfig, apply_funding};
use super::indicator::{IndicatorConfig, IndicatorEngine};
use super::metrics::BacktestResult;
use super::ohlcv::{Bar, validate_bars};
use super::position::OrderRecord;
use super::run_state::{EquityPoint, RunState};
use super::signal::{Signal, SignalGenerator, SignalRecord, select_signal};

const PROGRESS_INTERVAL: usize = 50_000;

/// Default annualization: one equity sample per minute.
pub const MINUTES_PER_YEAR: f64 = 365.0 * 24.0 * 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub indicators: IndicatorConfig,
    pub starting_balance: f64,
    pub position_size_fraction: f64,
    pub cooldown_bars: usize,
    pub funding: FundingConfig,
    pub periods_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            indicators: IndicatorConfig::default(),
            starting_balance: 10_000.0,
            position_size_fraction: 0.1,
            cooldown_bars: 1,
            funding: FundingConfig::default(),
            periods_per_year: MINUTES_PER_YEAR,
        }
    }
}

impl BacktestConfig {
    pub fn execution_params(&self) -> ExecutionParams {
        ExecutionParams {
            position_size_fraction: self.position_size_fraction,
            cooldown_bars: self.cooldown_bars,
        }
    }
}

/// Everything a run produces, handed to persistence after the replay.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestOutput {
    pub result: BacktestResult,
    pub equity_curve: Vec<EquityPoint>,
    pub orders: Vec<OrderRecord>,
    pub signals: Vec<SignalRecord>,
}

/// Processes a single bar against the run state given the signal selected
/// for that bar.
pub fn process_bar(
    state: &mut RunState,
    bar: &Bar,
    signal: Signal,
    config: &BacktestConfig,
) -> Transition {
    apply_funding(state, bar.timestamp, bar.close, &config.funding);
    state.record_equity(bar.timestamp, bar.close);
    state.last_bar = Some((bar.timestamp, bar.close));
    on_signal(state, bar.timestamp, bar.close, signal, &config.execution_params())
}

/// Closes a position left open at the end of the stream. Does not arm the
/// cooldown.
pub fn force_close(state: &mut RunState, timestamp: DateTime<Utc>, price: f64) -> Option<f64> {
    let realized = close_position(state, timestamp, price)?;
    debug!(%timestamp, price, realized, "open position force-closed at end of data");
    Some(realized)
}

pub fn run_backtest(bars: &[Bar], config: &BacktestConfig) -> Result<BacktestOutput, PerptraderError> {
    validate_bars(bars)?;

    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        info!(
            bars = bars.len(),
            start = %first.timestamp,
            end = %last.timestamp,
            starting_balance = config.starting_balance,
            "backtest started"
        );
    }

    let mut engine = IndicatorEngine::new(&config.indicators);
    let mut generator = SignalGenerator::new();
    let mut state = RunState::new(config.starting_balance);
    let mut signals = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let row = engine.update(bar);
        let flags = generator.update(&row);
        process_bar(&mut state, bar, select_signal(&flags), config);
        signals.push(SignalRecord::new(&row, &flags));

        let processed = i + 1;
        if processed % PROGRESS_INTERVAL == 0 {
            info!(processed, total = bars.len(), balance = state.balance, "backtest progress");
        }
    }

    if let Some((timestamp, price)) = state.last_bar {
        force_close(&mut state, timestamp, price);
    }

    let result = BacktestResult::compute(&state, config.periods_per_year);
    info!(
        end_balance = result.end_balance,
        total_return = result.total_return,
        total_trades = result.total_trades,
        max_drawdown = result.max_drawdown,
        sharpe = ?result.sharpe,
        "backtest finished"
    );

    Ok(BacktestOutput {
        result,
        equity_curve: state.equity_curve,
        orders: state.orders,
        signals,
    })
}

/// Indicator values and signals only, without replaying positions.
pub fn compute_signal_records(
    bars: &[Bar],
    config: &IndicatorConfig,
) -> Result<Vec<SignalRecord>, PerptraderError> {
    validate_bars(bars)?;
    let mut engine = IndicatorEngine::new(config);
    let mut generator = SignalGenerator::new();
    Ok(bars
        .iter()
        .map(|bar| {
            let row = engine.update(bar);
            let flags = generator.update(&row);
            SignalRecord::new(&row, &flags)
        })
        .collect())
}
