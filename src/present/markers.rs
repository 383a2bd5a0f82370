//! Input contract for the map widget.
//!
//! Only reported stations with at least one free charger get a marker, and
//! only when they carry a coordinate. Everything else still appears in the
//! ranked list.

use super::rank::RankedStation;
use crate::campuses::{self, Campus, DEFAULT_ZOOM, STATION_ZOOM};
use crate::geo::TransformTable;
use crate::logging::{self, Component};
use crate::model::{CoordSystem, Coordinate};

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// Free chargers at or below this count are shown as "low".
pub const LOW_AVAILABILITY_MAX: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityLevel {
    None,
    Low,
    Free,
}

impl AvailabilityLevel {
    pub fn classify(free: u32) -> Self {
        match free {
            0 => AvailabilityLevel::None,
            n if n <= LOW_AVAILABILITY_MAX => AvailabilityLevel::Low,
            _ => AvailabilityLevel::Free,
        }
    }

    /// Marker fill colour.
    pub fn color(self) -> &'static str {
        match self {
            AvailabilityLevel::None => "#bfbfbf",
            AvailabilityLevel::Low => "#faad14",
            AvailabilityLevel::Free => "#52c41a",
        }
    }

    /// Short status text for list rows.
    pub fn status_text(self, free: u32) -> String {
        match self {
            AvailabilityLevel::None => "no free chargers".to_string(),
            AvailabilityLevel::Low => format!("only {} left", free),
            AvailabilityLevel::Free => format!("{} available", free),
        }
    }
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub descriptor: String,
    /// Already in the working system.
    pub position: Coordinate,
    pub free: u32,
    pub total: u32,
    pub level: AvailabilityLevel,
    pub watched: bool,
}

/// Builds markers in ranked order, projecting into `working`.
pub fn map_markers(ranked: &[RankedStation], table: &TransformTable, working: CoordSystem) -> Vec<Marker> {
    let mut markers = Vec::new();
    for r in ranked {
        let view = &r.view;
        if !view.reported || view.free_count == 0 {
            continue;
        }
        let coordinate = match view.require_coordinate() {
            Ok(c) => c,
            Err(e) => {
                logging::debug(Component::Pipeline, Some(&view.descriptor), &format!("no marker: {}", e));
                continue;
            }
        };
        markers.push(Marker {
            descriptor: view.descriptor.clone(),
            position: table.convert(coordinate, working),
            free: view.free_count,
            total: view.total_count,
            level: AvailabilityLevel::classify(view.free_count),
            watched: r.watched,
        });
    }
    markers
}

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum MapView {
    /// Fit these bounds (south-west, north-east), padded by `pad` of the span.
    Bounds {
        south_west: Coordinate,
        north_east: Coordinate,
        pad: f64,
    },
    /// Center on a point.
    Center { center: Coordinate, zoom: u8 },
}

/// Fits all markers; with none, centers on the selected campus, else on the
/// default campus.
pub fn fit_view(markers: &[Marker], campus: Option<&Campus>, table: &TransformTable, working: CoordSystem) -> MapView {
    if let [only] = markers {
        // A single marker has no extent to fit.
        return MapView::Center {
            center: only.position,
            zoom: STATION_ZOOM,
        };
    }
    if let Some(first) = markers.first() {
        let mut sw = first.position;
        let mut ne = first.position;
        for m in &markers[1..] {
            sw.lng = sw.lng.min(m.position.lng);
            sw.lat = sw.lat.min(m.position.lat);
            ne.lng = ne.lng.max(m.position.lng);
            ne.lat = ne.lat.max(m.position.lat);
        }
        return MapView::Bounds {
            south_west: sw,
            north_east: ne,
            pad: 0.1,
        };
    }
    let campus = campus.unwrap_or_else(|| campuses::default_campus());
    MapView::Center {
        center: table.convert(campus.center(), working),
        zoom: DEFAULT_ZOOM,
    }
}
