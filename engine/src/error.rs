use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::TickOutcome;

/// Startup configuration failures. Always fatal: no tick is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Failure writing a confirmed onset to its sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-tick errors. Local to the tick; the stream keeps going.
#[derive(Error, Debug)]
pub enum TickError {
    #[error("out-of-order tick for {symbol}: ts {ts} < last {last_ts}")]
    OutOfOrder {
        symbol: String,
        ts: i64,
        last_ts: i64,
    },

    /// The tick was fully applied; `outcome` is what it caused.
    #[error("failed to emit onset for {symbol}@{ts}: {source}")]
    Sink {
        symbol: String,
        ts: i64,
        #[source]
        source: SinkError,
        outcome: Box<TickOutcome>,
    },
}

/// Why a pending confirmation could not be decided.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Undecidable {
    #[error("no ticks in the pre-window")]
    EmptyPreWindow,

    #[error("no ticks in the confirm window")]
    EmptyConfirmWindow,

    #[error("buffer evicted ticks inside the evaluation windows")]
    BufferEvicted,
}

/// Failures of the sharded dispatcher itself. Per-tick errors are handled
/// inside the workers and never surface here.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("worker {worker} terminated abnormally: {source}")]
    Worker {
        worker: usize,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("worker {worker} failed to flush its sink: {source}")]
    Flush {
        worker: usize,
        #[source]
        source: SinkError,
    },
}
