//! Geodetic helpers: reference-system conversion and distance queries.
//!
//! Submodules:
//! - `transform`: directed WGS84 / GCJ02 / BD09 converter matrix.
//! - `distance`: haversine distance from the user's WGS84 fix to stations.

pub mod distance;
pub mod transform;

pub use transform::{convert, TransformTable};
