//! Core data types for the charger occupancy engine.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no I/O. Wire formats live in `ingest::wire` and are converted
//! into these types at the edge.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Reference systems
// ---------------------------------------------------------------------------

/// A geodetic reference system.
///
/// WGS84 is GPS-native; GCJ02 and BD09 are the offset variants used by the
/// Gaode and Baidu map backends respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordSystem {
    #[serde(rename = "WGS84")]
    Wgs84,
    #[serde(rename = "GCJ02")]
    Gcj02,
    #[serde(rename = "BD09")]
    Bd09,
}

impl CoordSystem {
    pub const ALL: [CoordSystem; 3] = [CoordSystem::Wgs84, CoordSystem::Gcj02, CoordSystem::Bd09];

    /// Row/column index into the transform matrix.
    pub fn index(self) -> usize {
        match self {
            CoordSystem::Wgs84 => 0,
            CoordSystem::Gcj02 => 1,
            CoordSystem::Bd09 => 2,
        }
    }
}

impl fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordSystem::Wgs84 => write!(f, "WGS84"),
            CoordSystem::Gcj02 => write!(f, "GCJ02"),
            CoordSystem::Bd09 => write!(f, "BD09"),
        }
    }
}

impl FromStr for CoordSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "WGS84" => Ok(CoordSystem::Wgs84),
            "GCJ02" => Ok(CoordSystem::Gcj02),
            "BD09" => Ok(CoordSystem::Bd09),
            other => Err(format!("unknown coordinate system '{}'", other)),
        }
    }
}

/// A (longitude, latitude) pair tagged with its reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lng: f64,
    pub lat: f64,
    pub system: CoordSystem,
}

impl Coordinate {
    pub fn new(lng: f64, lat: f64, system: CoordSystem) -> Self {
        Coordinate { lng, lat, system }
    }
}

// ---------------------------------------------------------------------------
// Catalog and telemetry
// ---------------------------------------------------------------------------

/// Physical device identifier as reported by the providers.
pub type DeviceId = i64;

/// Static definition of one device, loaded once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCatalogEntry {
    /// Absent for descriptor-only devices.
    pub device_id: Option<DeviceId>,
    pub provider_id: String,
    pub provider_name: String,
    pub campus_id: Option<String>,
    pub descriptor: Option<String>,
    pub name: Option<String>,
    /// In the provider's native reference system.
    pub coordinate: Option<Coordinate>,
}

impl DeviceCatalogEntry {
    /// Station identity used for reconciliation: `descriptor ?? name`.
    ///
    /// Entries carrying neither fall back to a device-derived label so they
    /// still surface in list output.
    pub fn descriptor_key(&self) -> String {
        self.descriptor
            .as_deref()
            .or(self.name.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| match self.device_id {
                Some(id) => format!("device {}", id),
                None => UNKNOWN_STATION.to_string(),
            })
    }

    /// True if the entry lacks an explicit descriptor and name.
    pub fn is_missing_identity(&self) -> bool {
        let blank = |s: &Option<String>| s.as_deref().map(str::trim).unwrap_or("").is_empty();
        blank(&self.descriptor) && blank(&self.name)
    }
}

/// Label used when a record carries no usable identity at all.
pub const UNKNOWN_STATION: &str = "unknown station";

/// One reporting unit from the telemetry snapshot.
///
/// `free + used + error <= total` is expected upstream but never validated;
/// inconsistent counts are rendered as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStationStatus {
    pub descriptor: String,
    pub device_ids: Vec<DeviceId>,
    pub provider_id: String,
    pub provider_name: String,
    pub campus_id: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub free_count: u32,
    pub used_count: u32,
    pub total_count: u32,
    pub error_count: u32,
}

/// A full telemetry snapshot as returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    /// ISO 8601, e.g. "2025-01-01T12:00:00+08:00".
    pub updated_at: String,
    pub stations: Vec<LiveStationStatus>,
}

/// Entry of the provider directory. Only used to populate scope options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Reconciled view
// ---------------------------------------------------------------------------

/// Presentation-ready station record produced by one reconciliation pass.
///
/// When `reported` is false all counts are zero and carry no meaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationView {
    pub descriptor: String,
    pub device_ids: Vec<DeviceId>,
    pub provider_id: String,
    pub provider_name: String,
    pub campus_id: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub free_count: u32,
    pub used_count: u32,
    pub total_count: u32,
    pub error_count: u32,
    pub reported: bool,
}

impl StationView {
    /// Copies a live status verbatim.
    pub fn from_live(status: &LiveStationStatus) -> Self {
        StationView {
            descriptor: status.descriptor.clone(),
            device_ids: status.device_ids.clone(),
            provider_id: status.provider_id.clone(),
            provider_name: status.provider_name.clone(),
            campus_id: status.campus_id.clone(),
            coordinate: status.coordinate,
            free_count: status.free_count,
            used_count: status.used_count,
            total_count: status.total_count,
            error_count: status.error_count,
            reported: true,
        }
    }

    /// Builds the not-reporting stub for one or more catalog entries that
    /// share a descriptor. Identity fields come from the first entry; device
    /// ids are collected from all of them.
    pub fn unreported(descriptor: String, entries: &[&DeviceCatalogEntry]) -> Self {
        let first = entries.first();
        let mut device_ids: Vec<DeviceId> = Vec::new();
        for id in entries.iter().filter_map(|e| e.device_id) {
            if !device_ids.contains(&id) {
                device_ids.push(id);
            }
        }
        StationView {
            descriptor,
            device_ids,
            provider_id: first.map(|e| e.provider_id.clone()).unwrap_or_default(),
            provider_name: first.map(|e| e.provider_name.clone()).unwrap_or_default(),
            campus_id: first.and_then(|e| e.campus_id.clone()),
            coordinate: entries.iter().find_map(|e| e.coordinate),
            free_count: 0,
            used_count: 0,
            total_count: 0,
            error_count: 0,
            reported: false,
        }
    }

    pub fn has_geometry(&self) -> bool {
        self.coordinate.is_some()
    }

    /// Coordinate for operations that need geometry (marker placement,
    /// distance). Records without one are `MalformedRecord`.
    pub fn require_coordinate(&self) -> Result<Coordinate, EngineError> {
        self.coordinate.ok_or_else(|| EngineError::MalformedRecord {
            descriptor: self.descriptor.clone(),
            missing: "coordinate".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(descriptor: Option<&str>, name: Option<&str>, device_id: Option<DeviceId>) -> DeviceCatalogEntry {
        DeviceCatalogEntry {
            device_id,
            provider_id: "neptune".to_string(),
            provider_name: "Neptune".to_string(),
            campus_id: Some("2143".to_string()),
            descriptor: descriptor.map(String::from),
            name: name.map(String::from),
            coordinate: None,
        }
    }

    #[test]
    fn test_coord_system_parses_common_spellings() {
        assert_eq!("wgs84".parse::<CoordSystem>(), Ok(CoordSystem::Wgs84));
        assert_eq!("GCJ-02".parse::<CoordSystem>(), Ok(CoordSystem::Gcj02));
        assert_eq!(" bd09 ".parse::<CoordSystem>(), Ok(CoordSystem::Bd09));
        assert!("mercator".parse::<CoordSystem>().is_err());
    }

    #[test]
    fn test_coord_system_indices_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for system in CoordSystem::ALL {
            assert!(seen.insert(system.index()));
        }
    }

    #[test]
    fn test_descriptor_key_prefers_descriptor_then_name() {
        assert_eq!(entry(Some("Lot-7"), Some("ignored"), Some(1)).descriptor_key(), "Lot-7");
        assert_eq!(entry(None, Some("Lot-9"), Some(1)).descriptor_key(), "Lot-9");
        assert_eq!(entry(Some("  "), Some("Lot-9"), None).descriptor_key(), "Lot-9");
    }

    #[test]
    fn test_descriptor_key_falls_back_for_missing_identity() {
        let with_id = entry(None, None, Some(42));
        assert!(with_id.is_missing_identity());
        assert_eq!(with_id.descriptor_key(), "device 42");
        assert_eq!(entry(None, None, None).descriptor_key(), UNKNOWN_STATION);
    }

    #[test]
    fn test_unreported_stub_collects_device_ids_and_zeroes_counts() {
        let a = entry(Some("Lot-7"), None, Some(1));
        let b = entry(Some("Lot-7"), None, Some(2));
        let dup = entry(Some("Lot-7"), None, Some(1));
        let view = StationView::unreported("Lot-7".to_string(), &[&a, &b, &dup]);
        assert!(!view.reported);
        assert_eq!(view.device_ids, vec![1, 2]);
        assert_eq!(view.free_count + view.used_count + view.total_count + view.error_count, 0);
        assert_eq!(view.campus_id.as_deref(), Some("2143"));
    }

    #[test]
    fn test_require_coordinate_reports_malformed_record() {
        let view = StationView::unreported("Lot-7".to_string(), &[&entry(Some("Lot-7"), None, None)]);
        assert!(!view.has_geometry());
        match view.require_coordinate() {
            Err(EngineError::MalformedRecord { descriptor, missing }) => {
                assert_eq!(descriptor, "Lot-7");
                assert_eq!(missing, "coordinate");
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }
}
