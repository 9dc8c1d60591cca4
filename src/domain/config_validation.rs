//! Configuration validation.
//!
//! Every key is optional and falls back to its default; present values are
//! range-checked here before any bars are loaded.

use crate::domain::error::PerptraderError;
use crate::ports::config_port::ConfigPort;

const INTEGER_KEYS: &[(&str, &str)] = &[
    ("indicators", "rsi_fast_length"),
    ("indicators", "rsi_slow_length"),
    ("indicators", "bollinger_length"),
    ("indicators", "envelope_length"),
    ("indicators", "sma_length"),
    ("backtest", "cooldown_bars"),
    ("funding", "interval_hours"),
    ("sqlite", "pool_size"),
];

const FLOAT_KEYS: &[(&str, &str)] = &[
    ("indicators", "bollinger_factor"),
    ("indicators", "envelope_percent"),
    ("backtest", "starting_balance"),
    ("backtest", "position_size_fraction"),
    ("backtest", "periods_per_year"),
    ("funding", "rate"),
    ("data", "gap_tolerance"),
];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), PerptraderError> {
    validate_number_formats(config)?;
    validate_indicator_config(config)?;
    validate_backtest_config(config)?;
    validate_funding_config(config)?;
    validate_data_config(config)?;
    Ok(())
}

pub fn validate_indicator_config(config: &dyn ConfigPort) -> Result<(), PerptraderError> {
    for (key, default) in [
        ("rsi_fast_length", 7),
        ("rsi_slow_length", 14),
        ("bollinger_length", 20),
        ("envelope_length", 20),
        ("sma_length", 10),
    ] {
        if config.get_int("indicators", key, default) < 1 {
            return Err(invalid("indicators", key, format!("{key} must be at least 1")));
        }
    }

    let factor = config.get_double("indicators", "bollinger_factor", 0.4);
    if !factor.is_finite() || factor < 0.0 {
        return Err(invalid(
            "indicators",
            "bollinger_factor",
            "bollinger_factor must be non-negative".to_string(),
        ));
    }

    let percent = config.get_double("indicators", "envelope_percent", 0.0015);
    if !(0.0..1.0).contains(&percent) {
        return Err(invalid(
            "indicators",
            "envelope_percent",
            "envelope_percent must be in [0, 1)".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), PerptraderError> {
    let balance = config.get_double("backtest", "starting_balance", 10_000.0);
    if !balance.is_finite() || balance <= 0.0 {
        return Err(invalid(
            "backtest",
            "starting_balance",
            "starting_balance must be positive".to_string(),
        ));
    }

    let fraction = config.get_double("backtest", "position_size_fraction", 0.1);
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(invalid(
            "backtest",
            "position_size_fraction",
            "position_size_fraction must be in (0, 1]".to_string(),
        ));
    }

    if config.get_int("backtest", "cooldown_bars", 1) < 0 {
        return Err(invalid(
            "backtest",
            "cooldown_bars",
            "cooldown_bars must be non-negative".to_string(),
        ));
    }

    let periods = config.get_double("backtest", "periods_per_year", 525_600.0);
    if !periods.is_finite() || periods <= 0.0 {
        return Err(invalid(
            "backtest",
            "periods_per_year",
            "periods_per_year must be positive".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_funding_config(config: &dyn ConfigPort) -> Result<(), PerptraderError> {
    if !config.get_double("funding", "rate", 0.0001).is_finite() {
        return Err(invalid("funding", "rate", "rate must be finite".to_string()));
    }
    let hours = config.get_int("funding", "interval_hours", 8);
    if hours < 1 || hours > i64::from(u32::MAX) {
        return Err(invalid(
            "funding",
            "interval_hours",
            "interval_hours must be a positive number of hours".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), PerptraderError> {
    let tolerance = config.get_double("data", "gap_tolerance", 0.001);
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(invalid(
            "data",
            "gap_tolerance",
            "gap_tolerance must be non-negative".to_string(),
        ));
    }
    if config.get_int("sqlite", "pool_size", 4) < 1 {
        return Err(invalid(
            "sqlite",
            "pool_size",
            "pool_size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Present numeric values must parse; the typed getters would otherwise fall
/// back to the default silently.
fn validate_number_formats(config: &dyn ConfigPort) -> Result<(), PerptraderError> {
    for &(section, key) in INTEGER_KEYS {
        if let Some(raw) = config.get_string(section, key) {
            if raw.trim().parse::<i64>().is_err() {
                return Err(invalid(section, key, format!("'{raw}' is not an integer")));
            }
        }
    }
    for &(section, key) in FLOAT_KEYS {
        if let Some(raw) = config.get_string(section, key) {
            if raw.trim().parse::<f64>().is_err() {
                return Err(invalid(section, key, format!("'{raw}' is not a number")));
            }
        }
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: String) -> PerptraderError {
    PerptraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}
