//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables (after `.env` is loaded). Later layers win.
//!
//! Example `charger-watch.toml`:
//!
//! ```toml
//! api_url = "https://charger.example.edu"
//! fetch_interval = 60
//! data_coord_system = "BD09"
//! basemap = "gaode"
//! stale_after_minutes = 15
//! watchlist_dir = "./state"
//! ```

use crate::basemaps;
use crate::error::ConfigError;
use crate::logging::LogLevel;
use crate::model::CoordSystem;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_FETCH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_STALE_AFTER_MINUTES: u64 = 15;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// File layer
// ---------------------------------------------------------------------------

/// Every key is optional; absent keys keep the previous layer's value.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    api_url: Option<String>,
    catalog_url: Option<String>,
    fetch_interval: Option<u64>,
    data_coord_system: Option<String>,
    basemap: Option<String>,
    stale_after_minutes: Option<u64>,
    watchlist_dir: Option<PathBuf>,
    database_url: Option<String>,
    cache_file: Option<PathBuf>,
    log_level: Option<String>,
    log_file: Option<String>,
    http_timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL of the status API (`/api/status`, `/api/providers`, ...).
    pub api_url: String,
    /// Static catalog resource. Defaults to `<api_url>/api/stations`.
    pub catalog_url: Option<String>,
    pub fetch_interval_secs: u64,
    /// True once a file or env layer set the interval. The server's
    /// advertised interval is only adopted when this is false.
    pub fetch_interval_explicit: bool,
    /// Reference system the providers report coordinates in.
    pub data_coord_system: CoordSystem,
    pub basemap: String,
    pub stale_after_minutes: u64,
    pub watchlist_dir: Option<PathBuf>,
    /// Selects the postgres watchlist slot when set.
    pub database_url: Option<String>,
    /// `latest.json` mirror of the last good snapshot.
    pub cache_file: Option<PathBuf>,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
    pub http_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_url: DEFAULT_API_URL.to_string(),
            catalog_url: None,
            fetch_interval_secs: DEFAULT_FETCH_INTERVAL_SECS,
            fetch_interval_explicit: false,
            data_coord_system: CoordSystem::Bd09,
            basemap: basemaps::DEFAULT_BASEMAP.to_string(),
            stale_after_minutes: DEFAULT_STALE_AFTER_MINUTES,
            watchlist_dir: None,
            database_url: None,
            cache_file: None,
            log_level: LogLevel::Info,
            log_file: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

fn parse_coord_system(key: &str, value: &str) -> Result<CoordSystem, ConfigError> {
    value.parse::<CoordSystem>().map_err(|_| invalid(key, value))
}

fn parse_log_level(key: &str, value: &str) -> Result<LogLevel, ConfigError> {
    LogLevel::parse(value).ok_or_else(|| invalid(key, value))
}

fn parse_secs(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid(key, value))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl AppConfig {
    /// Loads `.env`, the optional TOML file, and the process environment.
    pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = AppConfig::default();
        if let Some(path) = path {
            let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            config.apply_toml(&text)?;
        }
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies a TOML document on top of the current values.
    pub fn apply_toml(&mut self, text: &str) -> Result<(), ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;

        if let Some(v) = file.api_url.and_then(non_empty) {
            self.api_url = v;
        }
        if let Some(v) = file.catalog_url.and_then(non_empty) {
            self.catalog_url = Some(v);
        }
        if let Some(v) = file.fetch_interval {
            self.fetch_interval_secs = v;
            self.fetch_interval_explicit = true;
        }
        if let Some(v) = file.data_coord_system {
            self.data_coord_system = parse_coord_system("data_coord_system", &v)?;
        }
        if let Some(v) = file.basemap.and_then(non_empty) {
            self.basemap = v;
        }
        if let Some(v) = file.stale_after_minutes {
            self.stale_after_minutes = v;
        }
        if let Some(v) = file.watchlist_dir {
            self.watchlist_dir = Some(v);
        }
        if let Some(v) = file.database_url.and_then(non_empty) {
            self.database_url = Some(v);
        }
        if let Some(v) = file.cache_file {
            self.cache_file = Some(v);
        }
        if let Some(v) = file.log_level {
            self.log_level = parse_log_level("log_level", &v)?;
        }
        if let Some(v) = file.log_file.and_then(non_empty) {
            self.log_file = Some(v);
        }
        if let Some(v) = file.http_timeout_secs {
            self.http_timeout_secs = v;
        }
        Ok(())
    }

    /// Applies environment overrides read through `lookup`. Blank values are
    /// ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(non_empty);

        if let Some(v) = get("CHARGER_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = get("CHARGER_CATALOG_URL") {
            self.catalog_url = Some(v);
        }
        if let Some(v) = get("FETCH_INTERVAL") {
            self.fetch_interval_secs = parse_secs("FETCH_INTERVAL", &v)?;
            self.fetch_interval_explicit = true;
        }
        if let Some(v) = get("CHARGER_DATA_COORD_SYSTEM") {
            self.data_coord_system = parse_coord_system("CHARGER_DATA_COORD_SYSTEM", &v)?;
        }
        if let Some(v) = get("CHARGER_BASEMAP") {
            self.basemap = v;
        }
        if let Some(v) = get("CHARGER_STALE_AFTER_MINUTES") {
            self.stale_after_minutes = parse_secs("CHARGER_STALE_AFTER_MINUTES", &v)?;
        }
        if let Some(v) = get("CHARGER_WATCHLIST_DIR") {
            self.watchlist_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("DATABASE_URL") {
            self.database_url = Some(v);
        }
        if let Some(v) = get("CHARGER_CACHE_FILE") {
            self.cache_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("CHARGER_LOG_LEVEL") {
            self.log_level = parse_log_level("CHARGER_LOG_LEVEL", &v)?;
        }
        if let Some(v) = get("CHARGER_LOG_FILE") {
            self.log_file = Some(v);
        }
        if let Some(v) = get("CHARGER_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = parse_secs("CHARGER_HTTP_TIMEOUT_SECS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_interval_secs == 0 {
            return Err(invalid("fetch_interval", "0"));
        }
        if self.http_timeout_secs == 0 {
            return Err(invalid("http_timeout_secs", "0"));
        }
        if basemaps::find_basemap(&self.basemap).is_none() {
            return Err(invalid("basemap", self.basemap.clone()));
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(invalid("api_url", self.api_url.clone()));
        }
        Ok(())
    }

    pub fn catalog_url(&self) -> String {
        match &self.catalog_url {
            Some(url) => url.clone(),
            None => format!("{}/api/stations", self.api_url.trim_end_matches('/')),
        }
    }
}
