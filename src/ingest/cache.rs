//! Last-good snapshot cache.
//!
//! Keeps the most recent successful snapshot in memory and, when a path is
//! configured, mirrors it to a `latest.json` file so a restart during an
//! outage still has something to show.

use crate::error::EngineError;
use crate::logging::{self, Component};
use crate::model::LiveSnapshot;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Where the snapshot used for a render came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Live,
    /// The server's published `latest.json`, used when the status endpoint
    /// failed.
    Mirror,
    Cache,
    None,
}

/// Result of resolving one fetch attempt against the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    /// The fetch succeeded.
    Fresh(LiveSnapshot),
    /// The status fetch failed but the published mirror answered.
    Mirrored { snapshot: LiveSnapshot, error: EngineError },
    /// The fetch failed; the last good snapshot stands in.
    Cached { snapshot: LiveSnapshot, error: EngineError },
    /// The fetch failed and nothing is cached.
    NoData(EngineError),
    /// Upstream throttled the request. The cache is not consulted.
    RateLimited(EngineError),
}

impl SnapshotOutcome {
    pub fn snapshot(&self) -> Option<&LiveSnapshot> {
        match self {
            SnapshotOutcome::Fresh(s) => Some(s),
            SnapshotOutcome::Mirrored { snapshot, .. } | SnapshotOutcome::Cached { snapshot, .. } => Some(snapshot),
            SnapshotOutcome::NoData(_) | SnapshotOutcome::RateLimited(_) => None,
        }
    }

    pub fn source(&self) -> SnapshotSource {
        match self {
            SnapshotOutcome::Fresh(_) => SnapshotSource::Live,
            SnapshotOutcome::Mirrored { .. } => SnapshotSource::Mirror,
            SnapshotOutcome::Cached { .. } => SnapshotSource::Cache,
            SnapshotOutcome::NoData(_) | SnapshotOutcome::RateLimited(_) => SnapshotSource::None,
        }
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            SnapshotOutcome::Fresh(_) => None,
            SnapshotOutcome::Mirrored { error, .. } | SnapshotOutcome::Cached { error, .. } => Some(error),
            SnapshotOutcome::NoData(e) | SnapshotOutcome::RateLimited(e) => Some(e),
        }
    }

    /// User-facing notice line, if the render is degraded.
    pub fn notice(&self) -> Option<String> {
        match self {
            SnapshotOutcome::Fresh(_) => None,
            SnapshotOutcome::Mirrored { snapshot, .. } => Some(format!(
                "status endpoint unavailable, showing the published snapshot from {}",
                snapshot.updated_at
            )),
            SnapshotOutcome::Cached { snapshot, .. } => {
                Some(format!("live data unavailable, showing data from {}", snapshot.updated_at))
            }
            SnapshotOutcome::NoData(_) => Some("no data".to_string()),
            SnapshotOutcome::RateLimited(EngineError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            }) => Some(format!("too many requests, retry in {}s", secs)),
            SnapshotOutcome::RateLimited(_) => Some("too many requests, try again shortly".to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct SnapshotCache {
    last: Option<LiveSnapshot>,
    file: Option<PathBuf>,
}

impl SnapshotCache {
    /// Memory-only cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache mirrored to `path`. An existing file seeds the cache; a missing
    /// or malformed one is ignored.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last = match load_file(&path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                logging::warn(
                    Component::Snapshot,
                    None,
                    &format!("ignoring cache file {}: {}", path.display(), e),
                );
                None
            }
        };
        SnapshotCache { last, file: Some(path) }
    }

    pub fn last(&self) -> Option<&LiveSnapshot> {
        self.last.as_ref()
    }

    /// Stores a good snapshot, mirroring it to disk when configured. A
    /// failed mirror write is logged and otherwise ignored.
    pub fn store(&mut self, snapshot: LiveSnapshot) {
        if let Some(path) = &self.file {
            if let Err(e) = write_file(path, &snapshot) {
                logging::warn(
                    Component::Snapshot,
                    None,
                    &format!("cannot write cache file {}: {}", path.display(), e),
                );
            }
        }
        self.last = Some(snapshot);
    }

    /// Folds one fetch result into an outcome.
    pub fn resolve(&mut self, result: Result<LiveSnapshot, EngineError>) -> SnapshotOutcome {
        match result {
            Ok(snapshot) => {
                self.store(snapshot.clone());
                SnapshotOutcome::Fresh(snapshot)
            }
            Err(e) if e.is_rate_limited() => SnapshotOutcome::RateLimited(e),
            Err(e) => match &self.last {
                Some(snapshot) => SnapshotOutcome::Cached {
                    snapshot: snapshot.clone(),
                    error: e,
                },
                None => SnapshotOutcome::NoData(e),
            },
        }
    }

    /// Folds a mirror snapshot fetched after the status endpoint failed with
    /// `error`. The mirror is good data and replaces the cached snapshot.
    pub fn resolve_mirror(&mut self, snapshot: LiveSnapshot, error: EngineError) -> SnapshotOutcome {
        self.store(snapshot.clone());
        SnapshotOutcome::Mirrored { snapshot, error }
    }
}

fn load_file(path: &Path) -> Result<Option<LiveSnapshot>, String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };
    serde_json::from_str(&text).map(Some).map_err(|e| e.to_string())
}

fn write_file(path: &Path, snapshot: &LiveSnapshot) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    let json = serde_json::to_string_pretty(snapshot).map_err(|e| e.to_string())?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| e.to_string())?;
    fs::rename(&tmp, path).map_err(|e| e.to_string())
}
