//! Error types shared across the engine.
//!
//! None of the `EngineError` kinds are fatal to the polling loop. Callers
//! that must stay total (transform, watchlist load, reconciliation) log the
//! error and degrade instead of propagating it.

use crate::model::CoordSystem;
use thiserror::Error;

/// The engine's error taxonomy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No converter is registered for the requested reference-system pair.
    #[error("conversion unavailable: {from} -> {to}")]
    TransformUnavailable { from: CoordSystem, to: CoordSystem },

    /// Network or parse failure on one of the upstream endpoints.
    #[error("fetch failed for {endpoint}: {reason}")]
    FetchFailed {
        endpoint: String,
        reason: String,
        status: Option<u16>,
    },

    /// Upstream explicitly throttled the request (HTTP 429).
    #[error("rate limited by {endpoint}")]
    RateLimited {
        endpoint: String,
        retry_after_secs: Option<u64>,
    },

    /// A record is missing a field some operation needs.
    #[error("malformed record '{descriptor}': missing {missing}")]
    MalformedRecord { descriptor: String, missing: String },

    /// Stored watchlist data could not be parsed.
    #[error("persisted watchlist is corrupt: {0}")]
    PersistenceCorrupt(String),
}

impl EngineError {
    pub fn fetch_failed(endpoint: &str, reason: impl Into<String>) -> Self {
        EngineError::FetchFailed {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
            status: None,
        }
    }

    /// True for the transient throttling condition, which the presentation
    /// layer shows as a notice rather than a failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, EngineError::RateLimited { .. })
    }
}

/// Errors raised by a durable key-value slot backend.
#[derive(Error, Debug)]
pub enum SlotError {
    #[error("slot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("slot database error: {0}")]
    Database(#[from] postgres::Error),

    #[error("slot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("slot backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while assembling `AppConfig`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
