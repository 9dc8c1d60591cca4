//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod signal;
pub mod position;
pub mod run_state;
pub mod execution;
pub mod funding;
pub mod metrics;
pub mod backtest;
pub mod gaps;
pub mod config_validation;
pub mod error;
