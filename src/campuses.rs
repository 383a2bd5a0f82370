//! Campus registry.
//!
//! Campus ids match the `campus` / `areaid` values reported by the upstream
//! providers. Centers are stored in BD09, the system the provider data uses,
//! and are converted into the working system when the map needs them.

use crate::model::{CoordSystem, Coordinate};

// ---------------------------------------------------------------------------
// Campus metadata
// ---------------------------------------------------------------------------

pub struct Campus {
    /// Upstream campus id, compared as a string against station records.
    pub id: &'static str,
    pub name: &'static str,
    /// BD09 latitude of the map center.
    pub center_lat: f64,
    /// BD09 longitude of the map center.
    pub center_lng: f64,
}

impl Campus {
    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.center_lng, self.center_lat, CoordSystem::Bd09)
    }
}

pub static CAMPUS_REGISTRY: &[Campus] = &[
    Campus {
        id: "2143",
        name: "Yuquan",
        center_lat: 30.27,
        center_lng: 120.12,
    },
    Campus {
        id: "1774",
        name: "Zijingang",
        center_lat: 30.299196,
        center_lng: 120.089946,
    },
];

/// Default map zoom when centering on a campus.
pub const DEFAULT_ZOOM: u8 = 15;

/// Zoom used when focusing a single station.
pub const STATION_ZOOM: u8 = 17;

/// The map opens on the first campus.
pub fn default_campus() -> &'static Campus {
    &CAMPUS_REGISTRY[0]
}

/// Looks up a campus by id. Returns `None` if not found.
pub fn find_campus(id: &str) -> Option<&'static Campus> {
    CAMPUS_REGISTRY.iter().find(|c| c.id == id.trim())
}

pub fn all_campus_ids() -> Vec<&'static str> {
    CAMPUS_REGISTRY.iter().map(|c| c.id).collect()
}
