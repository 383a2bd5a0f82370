//! JSON wire records for the status, catalog, provider and config endpoints.
//!
//! Upstream providers disagree on field names and on whether ids are
//! numbers or strings. Each known spelling gets its own optional field here
//! (records such as catalog rows carry both `name` and `devdescript`, which
//! rules out serde aliases) and conversion picks the first one present.
//!
//! Coordinates arrive in the providers' data system, passed in by the
//! caller, and are tagged accordingly.

use crate::logging::{self, Component};
use crate::model::{
    CoordSystem, Coordinate, DeviceCatalogEntry, DeviceId, LiveSnapshot, LiveStationStatus, ProviderInfo,
    UNKNOWN_STATION,
};
use serde::Deserialize;

// ============================================================================
// Lenient scalars
// ============================================================================

/// A scalar that some providers send as a number and others as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberOrText {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrText::Int(n) => Some(*n),
            NumberOrText::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            NumberOrText::Float(_) => None,
            NumberOrText::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            NumberOrText::Int(n) => Some(*n as f64),
            NumberOrText::Float(f) => Some(*f),
            NumberOrText::Text(s) => s.trim().parse::<f64>().ok(),
        };
        value.filter(|v| v.is_finite())
    }

    /// Label form used for campus ids: `2143`, `"2143"` and `2143.0` agree.
    pub fn as_label(&self) -> Option<String> {
        let label = match self {
            NumberOrText::Int(n) => n.to_string(),
            NumberOrText::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
            NumberOrText::Float(f) => f.to_string(),
            NumberOrText::Text(s) => s.trim().to_string(),
        };
        if label.is_empty() {
            None
        } else {
            Some(label)
        }
    }
}

/// Device ids as a list, a single scalar, or the `"[1,2,3]"` string form
/// produced by the scanner export.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DeviceIdField {
    Many(Vec<NumberOrText>),
    One(NumberOrText),
}

impl DeviceIdField {
    /// Unparseable ids are dropped individually.
    pub fn ids(&self) -> Vec<DeviceId> {
        let mut out = Vec::new();
        match self {
            DeviceIdField::Many(items) => {
                for item in items {
                    push_id(&mut out, item.as_i64(), item);
                }
            }
            DeviceIdField::One(NumberOrText::Text(s)) => {
                let inner = s.trim().trim_start_matches('[').trim_end_matches(']');
                for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let part = part.trim_matches('"').trim_matches('\'');
                    match part.parse::<DeviceId>() {
                        Ok(id) if !out.contains(&id) => out.push(id),
                        Ok(_) => {}
                        Err(_) => logging::debug(Component::Snapshot, None, &format!("dropping device id '{}'", part)),
                    }
                }
            }
            DeviceIdField::One(item) => push_id(&mut out, item.as_i64(), item),
        }
        out
    }
}

fn push_id(out: &mut Vec<DeviceId>, id: Option<DeviceId>, raw: &NumberOrText) {
    match id {
        Some(id) if !out.contains(&id) => out.push(id),
        Some(_) => {}
        None => logging::debug(Component::Snapshot, None, &format!("dropping device id {:?}", raw)),
    }
}

fn first_text(candidates: &[&Option<String>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn first_label(candidates: &[&Option<NumberOrText>]) -> Option<String> {
    candidates.iter().filter_map(|c| c.as_ref()).find_map(NumberOrText::as_label)
}

/// Counts are rendered as sent, except that negatives and unparseable values
/// read as 0 instead of failing the whole snapshot.
fn count(raw: &Option<NumberOrText>, field: &str, descriptor: &str) -> u32 {
    let Some(raw) = raw else {
        return 0;
    };
    match raw.as_f64() {
        Some(n) if n >= 0.0 => n.min(u32::MAX as f64) as u32,
        _ => {
            logging::debug(Component::Snapshot, Some(descriptor), &format!("{} count {:?} read as 0", field, raw));
            0
        }
    }
}

fn first_f64(candidates: &[&Option<NumberOrText>]) -> Option<f64> {
    candidates.iter().filter_map(|c| c.as_ref()).find_map(NumberOrText::as_f64)
}

// ============================================================================
// Station records
// ============================================================================

/// One station as sent by the status endpoint or the catalog resource.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireStation {
    #[serde(default)]
    pub devdescript: Option<String>,
    #[serde(default)]
    pub descriptor: Option<String>,
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub device_ids: Option<DeviceIdField>,
    #[serde(default)]
    pub devids: Option<DeviceIdField>,
    #[serde(default)]
    pub devid: Option<NumberOrText>,

    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,

    #[serde(default)]
    pub campus_id: Option<NumberOrText>,
    #[serde(default)]
    pub campus: Option<NumberOrText>,
    #[serde(default)]
    pub areaid: Option<NumberOrText>,

    #[serde(default)]
    pub lat: Option<NumberOrText>,
    #[serde(default)]
    pub latitude: Option<NumberOrText>,
    #[serde(default)]
    pub lon: Option<NumberOrText>,
    #[serde(default)]
    pub lng: Option<NumberOrText>,
    #[serde(default)]
    pub longitude: Option<NumberOrText>,

    #[serde(default)]
    pub free: Option<NumberOrText>,
    #[serde(default)]
    pub used: Option<NumberOrText>,
    #[serde(default)]
    pub total: Option<NumberOrText>,
    #[serde(default)]
    pub error: Option<NumberOrText>,
}

impl WireStation {
    pub fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids = Vec::new();
        for field in [&self.device_ids, &self.devids].into_iter().flatten() {
            for id in field.ids() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        if let Some(id) = self.devid.as_ref().and_then(NumberOrText::as_i64) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn provider_id(&self) -> String {
        first_text(&[&self.provider_id, &self.provider]).unwrap_or_else(|| "unknown".to_string())
    }

    /// Falls back to the provider id when no display name is sent.
    pub fn provider_name(&self) -> String {
        first_text(&[&self.provider_name]).unwrap_or_else(|| self.provider_id())
    }

    pub fn campus_id(&self) -> Option<String> {
        first_label(&[&self.campus_id, &self.campus, &self.areaid])
    }

    /// Both halves must be present and finite, otherwise the record has no
    /// geometry.
    pub fn coordinate(&self, data_system: CoordSystem) -> Option<Coordinate> {
        let lat = first_f64(&[&self.lat, &self.latitude])?;
        let lng = first_f64(&[&self.lon, &self.lng, &self.longitude])?;
        Some(Coordinate::new(lng, lat, data_system))
    }

    /// Converts a status record. Records without any descriptor keep a
    /// device-derived label so they still show up in the list.
    pub fn into_live(self, data_system: CoordSystem) -> LiveStationStatus {
        let device_ids = self.device_ids();
        let descriptor = first_text(&[&self.devdescript, &self.descriptor, &self.name]).unwrap_or_else(|| {
            let label = match device_ids.first() {
                Some(id) => format!("device {}", id),
                None => UNKNOWN_STATION.to_string(),
            };
            logging::debug(Component::Snapshot, Some(&label), "status record has no descriptor");
            label
        });
        LiveStationStatus {
            provider_id: self.provider_id(),
            provider_name: self.provider_name(),
            campus_id: self.campus_id(),
            coordinate: self.coordinate(data_system),
            free_count: count(&self.free, "free", &descriptor),
            used_count: count(&self.used, "used", &descriptor),
            total_count: count(&self.total, "total", &descriptor),
            error_count: count(&self.error, "error", &descriptor),
            descriptor,
            device_ids,
        }
    }

    /// Expands a catalog row into one entry per device id. Rows without ids
    /// become a single descriptor-only entry.
    pub fn into_catalog_entries(self, data_system: CoordSystem) -> Vec<DeviceCatalogEntry> {
        let template = DeviceCatalogEntry {
            device_id: None,
            provider_id: self.provider_id(),
            provider_name: self.provider_name(),
            campus_id: self.campus_id(),
            descriptor: first_text(&[&self.devdescript, &self.descriptor]),
            name: first_text(&[&self.name]),
            coordinate: self.coordinate(data_system),
        };
        let ids = self.device_ids();
        if ids.is_empty() {
            return vec![template];
        }
        ids.into_iter()
            .map(|id| DeviceCatalogEntry {
                device_id: Some(id),
                ..template.clone()
            })
            .collect()
    }
}

// ============================================================================
// Envelopes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WireSnapshot {
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub stations: Vec<WireStation>,
}

impl WireSnapshot {
    /// A missing timestamp is left empty; freshness checks treat it as stale.
    pub fn into_snapshot(self, data_system: CoordSystem) -> LiveSnapshot {
        LiveSnapshot {
            updated_at: self.updated_at.unwrap_or_default(),
            stations: self.stations.into_iter().map(|s| s.into_live(data_system)).collect(),
        }
    }
}

/// The catalog is either `{stations: [...]}` or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireCatalog {
    Bare(Vec<WireStation>),
    Wrapped {
        #[serde(default)]
        stations: Vec<WireStation>,
    },
}

impl WireCatalog {
    pub fn into_entries(self, data_system: CoordSystem) -> Vec<DeviceCatalogEntry> {
        let rows = match self {
            WireCatalog::Wrapped { stations } => stations,
            WireCatalog::Bare(stations) => stations,
        };
        rows.into_iter()
            .flat_map(|row| row.into_catalog_entries(data_system))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireProvider {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<WireProvider> for ProviderInfo {
    fn from(p: WireProvider) -> Self {
        let name = p.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| p.id.clone());
        ProviderInfo { id: p.id, name }
    }
}

/// Frontend config served by the API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub fetch_interval: Option<u64>,
}
