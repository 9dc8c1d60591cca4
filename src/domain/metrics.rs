//! Performance accounting: drawdown, trade counters and the final result.

use serde::Serialize;

use super::run_state::{EquityPoint, RunState};

/// Refreshes the balance peak and running maximum drawdown (percent).
/// Call after every balance mutation.
pub fn update_drawdown(state: &mut RunState) {
    if state.balance > state.peak_balance {
        state.peak_balance = state.balance;
    }
    if state.peak_balance > 0.0 {
        let drawdown = (state.peak_balance - state.balance) / state.peak_balance * 100.0;
        if drawdown > state.max_drawdown {
            state.max_drawdown = drawdown;
        }
    }
}

/// Classifies a close. Zero realized PnL is neither a win nor a loss.
pub fn record_close(state: &mut RunState, realized_pnl: f64) {
    if realized_pnl > 0.0 {
        state.winning_trades += 1;
    } else if realized_pnl < 0.0 {
        state.losing_trades += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub start_balance: f64,
    pub end_balance: f64,
    /// Percent.
    pub total_return: f64,
    pub total_trades: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent.
    pub win_rate: f64,
    /// Percent.
    pub max_drawdown: f64,
    pub sharpe: Option<f64>,
    pub funding_paid_total: f64,
}

impl BacktestResult {
    pub fn compute(state: &RunState, periods_per_year: f64) -> Self {
        let end_balance = state.balance;
        let total_return = if state.start_balance > 0.0 {
            (end_balance / state.start_balance - 1.0) * 100.0
        } else {
            0.0
        };

        let win_rate = if state.total_trades > 0 {
            state.winning_trades as f64 / state.total_trades as f64 * 100.0
        } else {
            0.0
        };

        BacktestResult {
            start_balance: state.start_balance,
            end_balance,
            total_return,
            total_trades: state.total_trades,
            long_trades: state.long_trades,
            short_trades: state.short_trades,
            winning_trades: state.winning_trades,
            losing_trades: state.losing_trades,
            win_rate,
            max_drawdown: state.max_drawdown,
            sharpe: compute_sharpe(&state.equity_curve, periods_per_year),
            funding_paid_total: state.funding_paid_total,
        }
    }
}

fn simple_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0].equity != 0.0)
        .map(|w| w[1].equity / w[0].equity - 1.0)
        .collect()
}

/// Annualized Sharpe over per-sample simple returns, using the N-1 sample
/// standard deviation. `None` for fewer than two returns or zero variance.
pub fn compute_sharpe(equity_curve: &[EquityPoint], periods_per_year: f64) -> Option<f64> {
    let returns = simple_returns(equity_curve);
    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    if !stddev.is_finite() || stddev == 0.0 {
        return None;
    }

    let sharpe = periods_per_year.sqrt() * mean / stddev;
    sharpe.is_finite().then_some(sharpe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap()
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                timestamp: ts(i as i64),
                equity,
            })
            .collect()
    }

    #[test]
    fn drawdown_tracks_peak() {
        let mut state = RunState::new(100.0);
        state.balance = 120.0;
        update_drawdown(&mut state);
        assert!((state.peak_balance - 120.0).abs() < f64::EPSILON);
        assert!(state.max_drawdown.abs() < f64::EPSILON);

        state.balance = 90.0;
        update_drawdown(&mut state);
        assert_relative_eq!(state.max_drawdown, 25.0, epsilon = 1e-12);
    }

    #[test]
    fn drawdown_never_decreases() {
        let mut state = RunState::new(100.0);
        state.balance = 80.0;
        update_drawdown(&mut state);
        state.balance = 95.0;
        update_drawdown(&mut state);
        assert_relative_eq!(state.max_drawdown, 20.0, epsilon = 1e-12);
        state.balance = 200.0;
        update_drawdown(&mut state);
        assert_relative_eq!(state.max_drawdown, 20.0, epsilon = 1e-12);
    }

    #[test]
    fn close_classification() {
        let mut state = RunState::new(100.0);
        record_close(&mut state, 5.0);
        record_close(&mut state, -1.0);
        record_close(&mut state, 0.0);
        assert_eq!(state.winning_trades, 1);
        assert_eq!(state.losing_trades, 1);
    }

    #[test]
    fn sharpe_known_value() {
        // returns 0.1, -0.1, 0.1 => mean 1/30, sample sd 0.11547
        let equity = curve(&[100.0, 110.0, 99.0, 108.9]);
        let sharpe = compute_sharpe(&equity, 1.0).unwrap();
        assert_relative_eq!(sharpe, 1.0 / (2.0 * 3.0_f64.sqrt()), max_relative = 1e-9);
    }

    #[test]
    fn sharpe_scales_with_sqrt_periods() {
        let equity = curve(&[100.0, 110.0, 99.0, 108.9]);
        let base = compute_sharpe(&equity, 1.0).unwrap();
        let scaled = compute_sharpe(&equity, 4.0).unwrap();
        assert_relative_eq!(scaled, base * 2.0, max_relative = 1e-12);
    }

    #[test]
    fn sharpe_undefined_for_short_curves() {
        assert_eq!(compute_sharpe(&[], 525_600.0), None);
        assert_eq!(compute_sharpe(&curve(&[100.0]), 525_600.0), None);
        assert_eq!(compute_sharpe(&curve(&[100.0, 101.0]), 525_600.0), None);
    }

    #[test]
    fn sharpe_undefined_for_flat_curve() {
        let equity = curve(&[100.0; 50]);
        assert_eq!(compute_sharpe(&equity, 525_600.0), None);
    }

    #[test]
    fn sharpe_skips_zero_equity() {
        let equity = curve(&[0.0, 100.0, 110.0, 99.0, 108.9]);
        let sharpe = compute_sharpe(&equity, 1.0).unwrap();
        assert_relative_eq!(sharpe, 1.0 / (2.0 * 3.0_f64.sqrt()), max_relative = 1e-9);
    }

    #[test]
    fn result_from_untouched_state() {
        let mut state = RunState::new(10_000.0);
        for i in 0..5 {
            state.record_equity(ts(i), 100.0);
        }
        let result = BacktestResult::compute(&state, 525_600.0);
        assert!((result.end_balance - 10_000.0).abs() < f64::EPSILON);
        assert!(result.total_return.abs() < f64::EPSILON);
        assert_eq!(result.total_trades, 0);
        assert!(result.win_rate.abs() < f64::EPSILON);
        assert!(result.max_drawdown.abs() < f64::EPSILON);
        assert_eq!(result.sharpe, None);
    }

    #[test]
    fn result_percentages() {
        let mut state = RunState::new(10_000.0);
        state.balance = 11_000.0;
        state.total_trades = 4;
        state.long_trades = 3;
        state.short_trades = 1;
        state.winning_trades = 3;
        state.losing_trades = 1;
        let result = BacktestResult::compute(&state, 525_600.0);
        assert_relative_eq!(result.total_return, 10.0, epsilon = 1e-9);
        assert_relative_eq!(result.win_rate, 75.0, epsilon = 1e-12);
        assert_eq!(result.long_trades, 3);
        assert_eq!(result.short_trades, 1);
    }
}
