//! Error handling for the market replay engine
//!
//! One error type covers loading, accounting and replay failures so that
//! callers can propagate with `?` and log a stable category.

use crate::config::ConfigError;
use crate::types::{DataKind, TimeRange};

/// Main error type for market replay
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    // Loading errors
    #[error("no {kind} data for {inst_id} on {exchange}")]
    CoverageMissing {
        exchange: String,
        inst_id: String,
        kind: DataKind,
    },

    #[error("available {kind} range for {inst_id} on {exchange} is unknown")]
    CoverageUnknown {
        exchange: String,
        inst_id: String,
        kind: DataKind,
    },

    #[error("{kind} data for {inst_id} on {exchange} covers {available}, requested {requested}")]
    CoverageInsufficient {
        exchange: String,
        inst_id: String,
        kind: DataKind,
        available: TimeRange,
        requested: TimeRange,
    },

    #[error("no instrument on {exchange} carries {interval_sec}s klines")]
    InvalidKlineInterval { exchange: String, interval_sec: u32 },

    #[error("klines enabled for {exchange} without an interval")]
    MissingKlineInterval { exchange: String },

    #[error("no market data loaded for {exchange}")]
    NoData { exchange: String },

    // Instrument errors
    #[error("invalid instrument id: {0}")]
    InvalidInstrument(String),

    #[error("instrument not registered for this replay: {0}")]
    UnknownInstrument(String),

    // Accounting errors
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("cannot pick a baseline currency from initial balances {0:?}")]
    AmbiguousBaseline(Vec<String>),

    // Replay errors
    #[error("this executor has already replayed its events")]
    AlreadyReplayed,

    // Wrapped errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse record: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ReplayError {
    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ReplayError::CoverageMissing { .. }
            | ReplayError::CoverageUnknown { .. }
            | ReplayError::CoverageInsufficient { .. }
            | ReplayError::InvalidKlineInterval { .. }
            | ReplayError::MissingKlineInterval { .. }
            | ReplayError::NoData { .. } => "load",

            ReplayError::InvalidInstrument(_)
            | ReplayError::UnknownInstrument(_)
            | ReplayError::ContractViolation(_)
            | ReplayError::AmbiguousBaseline(_) => "accounting",

            ReplayError::AlreadyReplayed => "replay",

            ReplayError::Config(_) => "config",

            ReplayError::Io(_) | ReplayError::Parse(_) => "io",
        }
    }

    pub(crate) fn violation(msg: impl Into<String>) -> Self {
        ReplayError::ContractViolation(msg.into())
    }
}

/// Result type alias for replay operations
pub type ReplayResult<T> = Result<T, ReplayError>;
