//! Invariants of the position state machine under arbitrary price paths and
//! signal sequences.

mod common;

use chrono::{TimeZone, Utc};
use common::*;
use perptrader::domain::backtest::{BacktestConfig, force_close, process_bar, run_backtest};
use perptrader::domain::run_state::RunState;
use perptrader::domain::signal::Signal;
use proptest::prelude::*;

const SIGNALS: [Signal; 5] = [
    Signal::NoSignal,
    Signal::LongEntry,
    Signal::ShortEntry,
    Signal::LongImmediate,
    Signal::ShortImmediate,
];

/// Hourly bars so runs cross funding boundaries.
fn hourly_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(Utc.timestamp_opt(BASE_EPOCH + i as i64 * 3600, 0).unwrap(), c))
        .collect()
}

fn path_and_signals() -> impl Strategy<Value = (Vec<f64>, Vec<usize>)> {
    (2usize..150).prop_flat_map(|n| {
        (
            prop::collection::vec(50.0f64..150.0, n),
            prop::collection::vec(0usize..SIGNALS.len(), n),
        )
    })
}

proptest! {
    #[test]
    fn quantity_and_entry_price_agree((closes, picks) in path_and_signals()) {
        let config = BacktestConfig::default();
        let mut state = RunState::new(config.starting_balance);
        for (bar, &pick) in hourly_bars(&closes).iter().zip(&picks) {
            process_bar(&mut state, bar, SIGNALS[pick], &config);
            prop_assert_eq!(state.quantity() == 0.0, state.entry_price().is_none());
        }
    }

    #[test]
    fn equity_is_balance_plus_unrealized((closes, picks) in path_and_signals()) {
        let config = BacktestConfig::default();
        let mut state = RunState::new(config.starting_balance);
        for (bar, &pick) in hourly_bars(&closes).iter().zip(&picks) {
            process_bar(&mut state, bar, SIGNALS[pick], &config);
            let unrealized = state
                .entry_price()
                .map_or(0.0, |entry| (bar.close - entry) * state.quantity());
            prop_assert!((state.equity(bar.close) - (state.balance + unrealized)).abs() < 1e-9);
        }
    }

    #[test]
    fn max_drawdown_never_decreases((closes, picks) in path_and_signals()) {
        let config = BacktestConfig::default();
        let mut state = RunState::new(config.starting_balance);
        let mut previous = state.max_drawdown;
        for (bar, &pick) in hourly_bars(&closes).iter().zip(&picks) {
            process_bar(&mut state, bar, SIGNALS[pick], &config);
            prop_assert!(state.max_drawdown >= previous);
            prop_assert!(state.max_drawdown >= 0.0);
            previous = state.max_drawdown;
        }
    }

    #[test]
    fn balance_moves_only_by_realized_pnl_and_funding((closes, picks) in path_and_signals()) {
        let config = BacktestConfig::default();
        let mut state = RunState::new(config.starting_balance);
        for (bar, &pick) in hourly_bars(&closes).iter().zip(&picks) {
            process_bar(&mut state, bar, SIGNALS[pick], &config);
        }
        if let Some((timestamp, price)) = state.last_bar {
            force_close(&mut state, timestamp, price);
        }

        let realized: f64 = state.orders.iter().map(|o| o.realized_pnl).sum();
        prop_assert!(state.is_flat());
        prop_assert!(
            (state.balance - state.start_balance - realized - state.funding_paid_total).abs() < 1e-6
        );
        prop_assert_eq!(state.total_trades, state.long_trades + state.short_trades);
        prop_assert!(state.winning_trades + state.losing_trades <= state.total_trades);
    }

    #[test]
    fn replay_always_ends_flat(closes in prop::collection::vec(90.0f64..110.0, 1..300)) {
        let output = run_backtest(&minute_bars(&closes), &BacktestConfig::default()).unwrap();
        prop_assert_eq!(output.equity_curve.len(), closes.len());
        prop_assert_eq!(output.signals.len(), closes.len());
        prop_assert_eq!(output.orders.len(), output.result.total_trades * 2);
        if let Some(last) = output.orders.last() {
            prop_assert_eq!(last.position_after, 0.0);
        }
    }
}
