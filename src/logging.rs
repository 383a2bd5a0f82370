//! Structured logging for the charger occupancy engine
//!
//! Provides component-tagged logging with optional station identifiers on
//! top of `tracing`. Console output goes to stderr; an append-only log file
//! can be added for daemon operation.

use crate::error::EngineError;
use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tfmt, Layer};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl LogLevel {
    /// Accepts the usual spellings ("debug", "warn", "WARNING", ...).
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Snapshot,
    Catalog,
    Providers,
    Watchlist,
    Transform,
    Pipeline,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Snapshot => write!(f, "SNAP"),
            Component::Catalog => write!(f, "CAT"),
            Component::Providers => write!(f, "PROV"),
            Component::Watchlist => write!(f, "WATCH"),
            Component::Transform => write!(f, "GEO"),
            Component::Pipeline => write!(f, "PIPE"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - upstream throttling or a known-degraded input
    Expected,
    /// Unexpected failure - server errors or payloads we cannot parse
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Initialize the global subscriber.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    let filter = min_level.as_filter();

    let console = if console_timestamps {
        tfmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    } else {
        tfmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .compact()
            .boxed()
    };

    let file_layer = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tfmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            ),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path, e);
                None
            }
        }
    });

    let _ = tracing_subscriber::registry()
        .with(console.with_filter(filter))
        .with(file_layer.with_filter(filter))
        .try_init();
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(component: Component, station: Option<&str>, message: &str) {
    tracing::info!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(component: Component, station: Option<&str>, message: &str) {
    tracing::warn!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(component: Component, station: Option<&str>, message: &str) {
    tracing::error!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(component: Component, station: Option<&str>, message: &str) {
    tracing::debug!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an engine error for logging purposes.
pub fn classify_failure(err: &EngineError) -> FailureType {
    match err {
        EngineError::RateLimited { .. } => FailureType::Expected,
        EngineError::TransformUnavailable { .. } => FailureType::Expected,
        EngineError::FetchFailed { status: Some(code), .. } if *code >= 500 => {
            FailureType::Unexpected
        }
        EngineError::FetchFailed { reason, .. } if reason.contains("parse") => {
            FailureType::Unexpected
        }
        EngineError::PersistenceCorrupt(_) => FailureType::Unexpected,
        _ => FailureType::Unknown,
    }
}

/// Log a fetch failure with automatic classification
pub fn log_fetch_failure(component: Component, operation: &str, err: &EngineError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(component, None, &message),
        FailureType::Unexpected => error(component, None, &message),
        FailureType::Unknown => warn(component, None, &message),
    }
}

// ---------------------------------------------------------------------------
// Reconciliation Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one reconciliation pass
pub fn log_reconcile_summary(reported: usize, unreported: usize, malformed: usize) {
    let message = format!(
        "Reconciled {} stations: {} reporting, {} not reporting, {} malformed",
        reported + unreported,
        reported,
        unreported,
        malformed
    );

    if malformed == 0 {
        info(Component::Pipeline, None, &message);
    } else {
        warn(Component::Pipeline, None, &message);
    }
}
