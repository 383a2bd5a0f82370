//! Distance from the user's live position to stations.
//!
//! The sensor fix arrives in WGS84. It is projected into the active working
//! system, and the station coordinate into the same system, before measuring,
//! so the number matches what the user sees between their dot and the marker.

use super::transform::TransformTable;
use crate::error::EngineError;
use crate::model::{CoordSystem, Coordinate, StationView};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in metres. Both points should share a system;
/// the offsets between systems are far below the haversine's own error.
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Projects a WGS84 sensor fix into the working system.
pub fn project_user(table: &TransformTable, user_wgs84: Coordinate, working: CoordSystem) -> Coordinate {
    let fix = Coordinate::new(user_wgs84.lng, user_wgs84.lat, CoordSystem::Wgs84);
    table.convert(fix, working)
}

/// Distance in metres from the user to one station.
///
/// Fails with `MalformedRecord` when the station has no coordinate.
pub fn distance_to_station(
    table: &TransformTable,
    user_wgs84: Coordinate,
    view: &StationView,
    working: CoordSystem,
) -> Result<f64, EngineError> {
    let station = table.convert(view.require_coordinate()?, working);
    let user = project_user(table, user_wgs84, working);
    Ok(haversine_m(user, station))
}

/// The `limit` closest stations with their distances, nearest first.
/// Stations without geometry are skipped.
pub fn nearest<'a>(
    table: &TransformTable,
    views: &'a [StationView],
    user_wgs84: Coordinate,
    working: CoordSystem,
    limit: usize,
) -> Vec<(&'a StationView, f64)> {
    let mut found: Vec<(&StationView, f64)> = views
        .iter()
        .filter_map(|v| distance_to_station(table, user_wgs84, v, working).ok().map(|d| (v, d)))
        .collect();
    found.sort_by(|a, b| a.1.total_cmp(&b.1));
    found.truncate(limit);
    found
}
