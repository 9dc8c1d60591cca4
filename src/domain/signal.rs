//! Entry signals derived from indicator crossovers.
//!
//! Four flags are evaluated per bar from the previous and current
//! [`IndicatorRow`]. A flag is only true when every indicator value it reads
//! is defined on both bars; undefined values never compare as zero.
//! [`select_signal`] then picks at most one [`Signal`] per bar in priority
//! order: long immediate, short immediate, long, short.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::indicator::IndicatorRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalFlags {
    pub long_entry: bool,
    pub short_entry: bool,
    pub long_imm_entry: bool,
    pub short_imm_entry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    NoSignal,
    LongEntry,
    ShortEntry,
    LongImmediate,
    ShortImmediate,
}

impl Signal {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Signal::NoSignal => None,
            Signal::LongEntry | Signal::LongImmediate => Some(Direction::Long),
            Signal::ShortEntry | Signal::ShortImmediate => Some(Direction::Short),
        }
    }

    pub fn name(self) -> Option<&'static str> {
        match self {
            Signal::NoSignal => None,
            Signal::LongEntry => Some("long_entry"),
            Signal::ShortEntry => Some("short_entry"),
            Signal::LongImmediate => Some("long_imm_entry"),
            Signal::ShortImmediate => Some("short_imm_entry"),
        }
    }
}

/// First true flag wins: long_imm > short_imm > long > short.
pub fn select_signal(flags: &SignalFlags) -> Signal {
    if flags.long_imm_entry {
        Signal::LongImmediate
    } else if flags.short_imm_entry {
        Signal::ShortImmediate
    } else if flags.long_entry {
        Signal::LongEntry
    } else if flags.short_entry {
        Signal::ShortEntry
    } else {
        Signal::NoSignal
    }
}

fn crossed_above(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a <= prev_b && a > b
}

fn crossed_below(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a >= prev_b && a < b
}

pub fn evaluate_flags(prev: &IndicatorRow, curr: &IndicatorRow) -> SignalFlags {
    let mut flags = SignalFlags::default();

    if let (Some(pf), Some(ps), Some(cf), Some(cs), Some(bb), Some(env), Some(sma)) = (
        prev.rsi_fast,
        prev.rsi_slow,
        curr.rsi_fast,
        curr.rsi_slow,
        curr.bollinger,
        curr.envelope,
        curr.sma,
    ) {
        let volatile = bb.upper >= env.upper && bb.lower <= env.lower;
        flags.long_entry = crossed_above(pf, ps, cf, cs) && volatile && sma >= bb.upper;
        flags.short_entry = crossed_below(pf, ps, cf, cs) && volatile && sma <= bb.lower;
    }

    if let (Some(prev_sma), Some(prev_env), Some(sma), Some(env)) =
        (prev.sma, prev.envelope, curr.sma, curr.envelope)
    {
        flags.long_imm_entry = crossed_above(prev_sma, prev_env.upper, sma, env.upper);
        flags.short_imm_entry = crossed_below(prev_sma, prev_env.lower, sma, env.lower);
    }

    flags
}

/// Streaming wrapper remembering the previous row.
#[derive(Debug, Clone, Default)]
pub struct SignalGenerator {
    prev: Option<IndicatorRow>,
}

impl SignalGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, row: &IndicatorRow) -> SignalFlags {
        let flags = match &self.prev {
            Some(prev) => evaluate_flags(prev, row),
            None => SignalFlags::default(),
        };
        self.prev = Some(row.clone());
        flags
    }
}

pub fn generate_signals(rows: &[IndicatorRow]) -> Vec<SignalFlags> {
    let mut generator = SignalGenerator::new();
    rows.iter().map(|row| generator.update(row)).collect()
}

/// Flat per-bar record of indicator values, flags and the selected signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub rsi_fast: Option<f64>,
    pub rsi_slow: Option<f64>,
    pub bb_mid: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub env_mid: Option<f64>,
    pub env_upper: Option<f64>,
    pub env_lower: Option<f64>,
    pub sma: Option<f64>,
    pub long_entry: bool,
    pub short_entry: bool,
    pub long_imm_entry: bool,
    pub short_imm_entry: bool,
    pub signal: Option<&'static str>,
}

impl SignalRecord {
    pub fn new(row: &IndicatorRow, flags: &SignalFlags) -> Self {
        SignalRecord {
            timestamp: row.timestamp,
            close: row.close,
            rsi_fast: row.rsi_fast,
            rsi_slow: row.rsi_slow,
            bb_mid: row.bollinger.map(|b| b.middle),
            bb_upper: row.bollinger.map(|b| b.upper),
            bb_lower: row.bollinger.map(|b| b.lower),
            env_mid: row.envelope.map(|b| b.middle),
            env_upper: row.envelope.map(|b| b.upper),
            env_lower: row.envelope.map(|b| b.lower),
            sma: row.sma,
            long_entry: flags.long_entry,
            short_entry: flags.short_entry,
            long_imm_entry: flags.long_imm_entry,
            short_imm_entry: flags.short_imm_entry,
            signal: select_signal(flags).name(),
        }
    }

    /// Names of every flag that is true on this bar, in priority order.
    pub fn fired_flags(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.long_imm_entry, Signal::LongImmediate),
            (self.short_imm_entry, Signal::ShortImmediate),
            (self.long_entry, Signal::LongEntry),
            (self.short_entry, Signal::ShortEntry),
        ]
        .into_iter()
        .filter_map(|(fired, signal)| if fired { signal.name() } else { None })
    }
}
