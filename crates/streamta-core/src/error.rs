use thiserror::Error;

/// The engine's error taxonomy. Every variant is surfaced at its natural
/// boundary; none are retried or silently swallowed.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("invalid indicator config for {id}: {reason}")]
    InvalidConfig { id: String, reason: String },

    #[error("unsupported indicator type {0:?}; see Registry::supported_types() for the list")]
    UnsupportedIndicator(String),

    #[error("invalid timeframe {0:?}")]
    InvalidTimeframe(String),

    #[error("cannot resample {source:?} to {target:?}: {reason}")]
    InvalidResampleRatio {
        source: String,
        target: String,
        reason: String,
    },

    #[error("indicator {id} failed updating on bar at ts={timestamp_ms}: {cause}")]
    IndicatorUpdateError {
        id: String,
        timestamp_ms: i64,
        cause: String,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
