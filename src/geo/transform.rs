//! Conversion between WGS84, GCJ02 and BD09.
//!
//! Converters are held in a 3x3 matrix indexed by `(from, to)`. Every
//! directed pair has its own entry; BD09 -> WGS84 is looked up directly and
//! never chained through GCJ02 by the table. A missing entry degrades to the
//! identity coordinate and is reported as `TransformUnavailable`.
//!
//! The formulas are the standard public approximations (Krasovsky 1940
//! ellipsoid offsets for GCJ02, the Baidu polar offset for BD09). Accuracy is
//! a few metres, which is enough to place a charger on a campus map.

use crate::error::EngineError;
use crate::logging::{self, Component};
use crate::model::{CoordSystem, Coordinate};
use std::f64::consts::PI;

/// A directed converter over `(lng, lat)`.
pub type ConvertFn = fn(f64, f64) -> (f64, f64);

const KRASOVSKY_A: f64 = 6_378_245.0;
const KRASOVSKY_EE: f64 = 0.006_693_421_622_965_943;
const X_PI: f64 = PI * 3000.0 / 180.0;

// ---------------------------------------------------------------------------
// Transform table
// ---------------------------------------------------------------------------

/// Matrix of directed converters.
#[derive(Clone)]
pub struct TransformTable {
    entries: [[Option<ConvertFn>; 3]; 3],
}

impl Default for TransformTable {
    fn default() -> Self {
        TransformTable::standard()
    }
}

impl TransformTable {
    /// All six directed pairs.
    pub fn standard() -> Self {
        let mut table = TransformTable::empty();
        table.register(CoordSystem::Wgs84, CoordSystem::Gcj02, wgs84_to_gcj02);
        table.register(CoordSystem::Wgs84, CoordSystem::Bd09, wgs84_to_bd09);
        table.register(CoordSystem::Gcj02, CoordSystem::Wgs84, gcj02_to_wgs84);
        table.register(CoordSystem::Gcj02, CoordSystem::Bd09, gcj02_to_bd09);
        table.register(CoordSystem::Bd09, CoordSystem::Wgs84, bd09_to_wgs84);
        table.register(CoordSystem::Bd09, CoordSystem::Gcj02, bd09_to_gcj02);
        table
    }

    /// A table with no converters; every non-identity call degrades.
    pub fn empty() -> Self {
        TransformTable { entries: [[None; 3]; 3] }
    }

    pub fn register(&mut self, from: CoordSystem, to: CoordSystem, f: ConvertFn) {
        self.entries[from.index()][to.index()] = Some(f);
    }

    /// Drops one directed pair, e.g. to model a build without it.
    pub fn without(mut self, from: CoordSystem, to: CoordSystem) -> Self {
        self.entries[from.index()][to.index()] = None;
        self
    }

    pub fn converter(&self, from: CoordSystem, to: CoordSystem) -> Option<ConvertFn> {
        self.entries[from.index()][to.index()]
    }

    /// Converts `coord` into `to`, or reports that no converter exists.
    pub fn try_convert(&self, coord: Coordinate, to: CoordSystem) -> Result<Coordinate, EngineError> {
        if coord.system == to {
            return Ok(coord);
        }
        match self.converter(coord.system, to) {
            Some(f) => {
                let (lng, lat) = f(coord.lng, coord.lat);
                Ok(Coordinate::new(lng, lat, to))
            }
            None => Err(EngineError::TransformUnavailable {
                from: coord.system,
                to,
            }),
        }
    }

    /// Total conversion: a missing converter is logged and the input is
    /// returned unchanged (still tagged with its original system).
    pub fn convert(&self, coord: Coordinate, to: CoordSystem) -> Coordinate {
        match self.try_convert(coord, to) {
            Ok(converted) => converted,
            Err(err) => {
                logging::warn(Component::Transform, None, &err.to_string());
                coord
            }
        }
    }
}

/// `convert(coordinate, fromSystem, toSystem)` over the standard table.
pub fn convert(coord: Coordinate, to: CoordSystem) -> Coordinate {
    TransformTable::standard().convert(coord, to)
}

// ---------------------------------------------------------------------------
// Converters
// ---------------------------------------------------------------------------

/// Outside mainland China no GCJ02 offset is applied.
pub fn out_of_china(lng: f64, lat: f64) -> bool {
    !(72.004..=137.8347).contains(&lng) || !(0.8293..=55.8271).contains(&lat)
}

fn offset_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn offset_lng(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

/// GCJ02 offset (dlng, dlat) at a WGS84-ish point.
fn gcj02_delta(lng: f64, lat: f64) -> (f64, f64) {
    let mut dlat = offset_lat(lng - 105.0, lat - 35.0);
    let mut dlng = offset_lng(lng - 105.0, lat - 35.0);
    let radlat = lat / 180.0 * PI;
    let magic = 1.0 - KRASOVSKY_EE * radlat.sin() * radlat.sin();
    let sqrt_magic = magic.sqrt();
    dlat = (dlat * 180.0) / ((KRASOVSKY_A * (1.0 - KRASOVSKY_EE)) / (magic * sqrt_magic) * PI);
    dlng = (dlng * 180.0) / (KRASOVSKY_A / sqrt_magic * radlat.cos() * PI);
    (dlng, dlat)
}

pub fn wgs84_to_gcj02(lng: f64, lat: f64) -> (f64, f64) {
    if out_of_china(lng, lat) {
        return (lng, lat);
    }
    let (dlng, dlat) = gcj02_delta(lng, lat);
    (lng + dlng, lat + dlat)
}

/// Single-step inverse: subtracts the offset evaluated at the GCJ02 point.
pub fn gcj02_to_wgs84(lng: f64, lat: f64) -> (f64, f64) {
    if out_of_china(lng, lat) {
        return (lng, lat);
    }
    let (dlng, dlat) = gcj02_delta(lng, lat);
    (lng - dlng, lat - dlat)
}

pub fn gcj02_to_bd09(lng: f64, lat: f64) -> (f64, f64) {
    let z = (lng * lng + lat * lat).sqrt() + 0.000_02 * (lat * X_PI).sin();
    let theta = lat.atan2(lng) + 0.000_003 * (lng * X_PI).cos();
    (z * theta.cos() + 0.0065, z * theta.sin() + 0.006)
}

pub fn bd09_to_gcj02(lng: f64, lat: f64) -> (f64, f64) {
    let x = lng - 0.0065;
    let y = lat - 0.006;
    let z = (x * x + y * y).sqrt() - 0.000_02 * (y * X_PI).sin();
    let theta = y.atan2(x) - 0.000_003 * (x * X_PI).cos();
    (z * theta.cos(), z * theta.sin())
}

pub fn wgs84_to_bd09(lng: f64, lat: f64) -> (f64, f64) {
    let (g_lng, g_lat) = wgs84_to_gcj02(lng, lat);
    gcj02_to_bd09(g_lng, g_lat)
}

pub fn bd09_to_wgs84(lng: f64, lat: f64) -> (f64, f64) {
    let (g_lng, g_lat) = bd09_to_gcj02(lng, lat);
    gcj02_to_wgs84(g_lng, g_lat)
}
