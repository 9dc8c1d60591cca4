//! Domain error types.

use chrono::{DateTime, Utc};

/// Top-level error type for perptrader.
#[derive(Debug, thiserror::Error)]
pub enum PerptraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("bar series is empty")]
    EmptySeries,

    #[error("timestamp at bar {index} ({current}) is not after the previous bar ({previous})")]
    NonMonotonicTimestamp {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("invalid {field} price at bar {index}: {value}")]
    InvalidPrice {
        index: usize,
        field: &'static str,
        value: f64,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PerptraderError {
    /// True for failures of the bar-series precondition checked before a run.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            PerptraderError::EmptySeries
                | PerptraderError::NonMonotonicTimestamp { .. }
                | PerptraderError::InvalidPrice { .. }
        )
    }
}

impl From<csv::Error> for PerptraderError {
    fn from(err: csv::Error) -> Self {
        PerptraderError::Data {
            reason: err.to_string(),
        }
    }
}

impl From<&PerptraderError> for std::process::ExitCode {
    fn from(err: &PerptraderError) -> Self {
        let code: u8 = match err {
            PerptraderError::Io(_) => 1,
            PerptraderError::ConfigParse { .. }
            | PerptraderError::ConfigMissing { .. }
            | PerptraderError::ConfigInvalid { .. } => 2,
            PerptraderError::Database { .. } | PerptraderError::DatabaseQuery { .. } => 3,
            PerptraderError::EmptySeries
            | PerptraderError::NonMonotonicTimestamp { .. }
            | PerptraderError::InvalidPrice { .. } => 5,
            PerptraderError::Data { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
