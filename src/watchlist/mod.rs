//! Watchlist of user-flagged stations.
//!
//! Membership is the union of two independent rules: a `(device id,
//! provider)` pair, or a bare descriptor. The store never infers a provider;
//! callers resolve it from session data first.
//!
//! The whole set is persisted as one JSON document under a single slot key.
//! Loading is fail-open: a missing or corrupt document yields an empty store.
//!
//! Toggling is check-then-act and assumes a single writer. Two processes
//! toggling against the same slot race, and the last write wins.

pub mod slot;

use crate::error::{EngineError, SlotError};
use crate::logging::{self, Component};
use crate::model::DeviceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slot::KvSlot;
use std::collections::BTreeSet;

/// Slot key holding the persisted watchlist.
pub const WATCHLIST_SLOT_KEY: &str = "charger_watchlist";

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Composite device identity. Device ids are only unique per provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    #[serde(rename = "devid")]
    pub device_id: DeviceId,
    #[serde(rename = "provider")]
    pub provider_id: String,
}

impl DeviceKey {
    pub fn new(device_id: DeviceId, provider_id: &str) -> Self {
        DeviceKey {
            device_id,
            provider_id: provider_id.to_string(),
        }
    }
}

/// Result of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchToggle {
    Added,
    Removed,
}

/// Persisted shape: `{ devids: [{devid, provider}], devdescripts: [..], updated_at }`.
#[derive(Debug, Serialize, Deserialize)]
struct WatchlistDocument {
    #[serde(default)]
    devids: Vec<DeviceKey>,
    #[serde(default)]
    devdescripts: Vec<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchlistStore {
    devices: BTreeSet<DeviceKey>,
    descriptors: BTreeSet<String>,
}

fn clean_descriptor(descriptor: &str) -> Option<&str> {
    let trimmed = descriptor.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

impl WatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.descriptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len() + self.descriptors.len()
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceKey> {
        self.devices.iter()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(String::as_str)
    }

    /// True if any `(device id, provider)` pair is a member, or the
    /// descriptor alone is. Without a provider only the descriptor counts.
    pub fn is_watched(&self, device_ids: &[DeviceId], descriptor: &str, provider_id: Option<&str>) -> bool {
        if let Some(provider) = provider_id {
            let by_device = device_ids
                .iter()
                .any(|&id| self.devices.contains(&DeviceKey::new(id, provider)));
            if by_device {
                return true;
            }
        }
        clean_descriptor(descriptor).is_some_and(|d| self.descriptors.contains(d))
    }

    /// Adds every device key (when the provider is known) and the descriptor.
    /// Returns true if anything new was inserted.
    pub fn add(&mut self, device_ids: &[DeviceId], descriptor: &str, provider_id: Option<&str>) -> bool {
        let mut changed = false;
        match provider_id {
            Some(provider) => {
                for &id in device_ids {
                    changed |= self.devices.insert(DeviceKey::new(id, provider));
                }
            }
            None if !device_ids.is_empty() => {
                logging::warn(
                    Component::Watchlist,
                    Some(descriptor),
                    "device ids given without a provider; only the descriptor is stored",
                );
            }
            None => {}
        }
        if let Some(d) = clean_descriptor(descriptor) {
            changed |= self.descriptors.insert(d.to_string());
        }
        changed
    }

    /// Mirror of `add`. Returns true if anything was removed.
    pub fn remove(&mut self, device_ids: &[DeviceId], descriptor: &str, provider_id: Option<&str>) -> bool {
        let mut changed = false;
        if let Some(provider) = provider_id {
            for &id in device_ids {
                changed |= self.devices.remove(&DeviceKey::new(id, provider));
            }
        }
        if let Some(d) = clean_descriptor(descriptor) {
            changed |= self.descriptors.remove(d);
        }
        changed
    }

    /// `remove` if currently watched, else `add`.
    pub fn toggle(&mut self, device_ids: &[DeviceId], descriptor: &str, provider_id: Option<&str>) -> WatchToggle {
        if self.is_watched(device_ids, descriptor, provider_id) {
            self.remove(device_ids, descriptor, provider_id);
            WatchToggle::Removed
        } else {
            self.add(device_ids, descriptor, provider_id);
            WatchToggle::Added
        }
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    pub fn to_json_at(&self, now: DateTime<Utc>) -> Result<String, serde_json::Error> {
        let doc = WatchlistDocument {
            devids: self.devices.iter().cloned().collect(),
            devdescripts: self.descriptors.iter().cloned().collect(),
            updated_at: Some(now.to_rfc3339()),
        };
        serde_json::to_string(&doc)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let doc: WatchlistDocument =
            serde_json::from_str(json).map_err(|e| EngineError::PersistenceCorrupt(e.to_string()))?;
        let mut store = WatchlistStore::new();
        store.devices.extend(doc.devids);
        store
            .descriptors
            .extend(doc.devdescripts.iter().filter_map(|d| clean_descriptor(d)).map(String::from));
        Ok(store)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Serializes the whole set into the slot.
    pub fn persist(&self, slot: &dyn KvSlot) -> Result<(), SlotError> {
        self.persist_at(slot, Utc::now())
    }

    pub fn persist_at(&self, slot: &dyn KvSlot, now: DateTime<Utc>) -> Result<(), SlotError> {
        let json = self.to_json_at(now)?;
        slot.write(WATCHLIST_SLOT_KEY, &json)
    }

    /// Loads the store. Missing, unreadable or corrupt data yields an empty
    /// store; the condition is logged, never returned.
    pub fn load(slot: &dyn KvSlot) -> Self {
        let raw = match slot.read(WATCHLIST_SLOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return WatchlistStore::new(),
            Err(e) => {
                logging::warn(Component::Watchlist, None, &format!("watchlist slot unreadable: {}", e));
                return WatchlistStore::new();
            }
        };
        match WatchlistStore::from_json(&raw) {
            Ok(store) => {
                logging::debug(
                    Component::Watchlist,
                    None,
                    &format!("loaded {} watchlist keys", store.len()),
                );
                store
            }
            Err(e) => {
                logging::warn(Component::Watchlist, None, &format!("{}; starting empty", e));
                WatchlistStore::new()
            }
        }
    }
}
