//! Charger status API client
//!
//! Blocking HTTP client for the four upstream resources:
//!
//! - `GET /api/status[?provider=<id>]`: live snapshot
//! - `GET /api/stations` (or a configured static URL): device catalog
//! - `GET /api/providers`: provider directory
//! - `GET /api/config`: server-advertised poll interval
//!
//! plus the static `/data/latest.json` mirror the server publishes after
//! each fetch cycle.
//!
//! Every response goes through `check_status`, so throttling is detected in
//! exactly one place and surfaces as `EngineError::RateLimited` regardless
//! of which endpoint was hit.

use super::wire::{RemoteConfig, WireCatalog, WireProvider, WireSnapshot};
use crate::config::AppConfig;
use crate::error::EngineError;
use crate::logging::{self, Component};
use crate::model::{CoordSystem, DeviceCatalogEntry, LiveSnapshot, ProviderInfo};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const STATUS_PATH: &str = "/api/status";
pub const CATALOG_PATH: &str = "/api/stations";
pub const PROVIDERS_PATH: &str = "/api/providers";
pub const CONFIG_PATH: &str = "/api/config";
pub const MIRROR_PATH: &str = "/data/latest.json";

// ============================================================================
// Status classification
// ============================================================================

/// Parses a `Retry-After` header given in seconds. HTTP-date values are not
/// used by the API and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

/// Maps an HTTP status to the engine's error taxonomy.
///
/// 429 is `RateLimited`; any other non-2xx is `FetchFailed` carrying the
/// status code.
pub fn check_status(endpoint: &str, status: u16, retry_after: Option<&str>) -> Result<(), EngineError> {
    match status {
        200..=299 => Ok(()),
        429 => Err(EngineError::RateLimited {
            endpoint: endpoint.to_string(),
            retry_after_secs: retry_after.and_then(parse_retry_after),
        }),
        code => Err(EngineError::FetchFailed {
            endpoint: endpoint.to_string(),
            reason: format!("HTTP {}", code),
            status: Some(code),
        }),
    }
}

/// Decodes a JSON body, tagging failures so they classify as parse errors.
pub fn decode_body<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, EngineError> {
    serde_json::from_str(body).map_err(|e| EngineError::fetch_failed(endpoint, format!("parse error: {}", e)))
}

// ============================================================================
// Client
// ============================================================================

pub struct ApiClient {
    http: Client,
    base_url: String,
    catalog_url: String,
    data_system: CoordSystem,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        catalog_url: Option<&str>,
        data_system: CoordSystem,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("charger-watch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EngineError::fetch_failed("client", e.to_string()))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let catalog_url = match catalog_url {
            Some(url) => url.to_string(),
            None => format!("{}{}", base_url, CATALOG_PATH),
        };

        Ok(ApiClient {
            http,
            base_url,
            catalog_url,
            data_system,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, EngineError> {
        ApiClient::new(
            &config.api_url,
            Some(&config.catalog_url()),
            config.data_coord_system,
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn data_system(&self) -> CoordSystem {
        self.data_system
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url).header(ACCEPT, "application/json")
    }

    /// Status request with the optional provider filter, percent-encoded as a
    /// query parameter.
    fn status_request(&self, provider: Option<&str>) -> RequestBuilder {
        let request = self.get(&format!("{}{}", self.base_url, STATUS_PATH));
        match provider.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => request.query(&[("provider", p)]),
            None => request,
        }
    }

    /// The URL `fetch_snapshot` would request.
    pub fn status_url(&self, provider: Option<&str>) -> Result<String, EngineError> {
        self.status_request(provider)
            .build()
            .map(|r| r.url().to_string())
            .map_err(|e| EngineError::fetch_failed("status", e.to_string()))
    }

    fn get_json<T: DeserializeOwned>(&self, endpoint: &str, request: RequestBuilder) -> Result<T, EngineError> {
        let request = request
            .build()
            .map_err(|e| EngineError::fetch_failed(endpoint, e.to_string()))?;
        logging::debug(Component::System, None, &format!("GET {}", request.url()));

        let response = self
            .http
            .execute(request)
            .map_err(|e| EngineError::fetch_failed(endpoint, e.to_string()))?;

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        check_status(endpoint, response.status().as_u16(), retry_after.as_deref())?;

        let body = response
            .text()
            .map_err(|e| EngineError::fetch_failed(endpoint, e.to_string()))?;
        decode_body(endpoint, &body)
    }

    /// Fetches the live snapshot, optionally narrowed to one provider.
    pub fn fetch_snapshot(&self, provider: Option<&str>) -> Result<LiveSnapshot, EngineError> {
        let wire: WireSnapshot = self.get_json("status", self.status_request(provider))?;
        let snapshot = wire.into_snapshot(self.data_system);
        logging::debug(
            Component::Snapshot,
            None,
            &format!("{} stations, updated {}", snapshot.stations.len(), snapshot.updated_at),
        );
        Ok(snapshot)
    }

    /// Fetches the static `latest.json` mirror published by the server.
    pub fn fetch_mirror_snapshot(&self) -> Result<LiveSnapshot, EngineError> {
        let url = format!("{}{}", self.base_url, MIRROR_PATH);
        let wire: WireSnapshot = self.get_json("mirror", self.get(&url))?;
        Ok(wire.into_snapshot(self.data_system))
    }

    /// Fetches the device catalog, one entry per device id.
    pub fn fetch_catalog(&self) -> Result<Vec<DeviceCatalogEntry>, EngineError> {
        let wire: WireCatalog = self.get_json("catalog", self.get(&self.catalog_url))?;
        let entries = wire.into_entries(self.data_system);
        logging::info(Component::Catalog, None, &format!("Loaded {} catalog entries", entries.len()));
        Ok(entries)
    }

    pub fn fetch_providers(&self) -> Result<Vec<ProviderInfo>, EngineError> {
        let url = format!("{}{}", self.base_url, PROVIDERS_PATH);
        let wire: Vec<WireProvider> = self.get_json("providers", self.get(&url))?;
        Ok(wire.into_iter().map(ProviderInfo::from).collect())
    }

    pub fn fetch_remote_config(&self) -> Result<RemoteConfig, EngineError> {
        let url = format!("{}{}", self.base_url, CONFIG_PATH);
        self.get_json("config", self.get(&url))
    }
}
