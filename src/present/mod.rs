//! Filter & rank pipeline and the map-facing output built from it.
//!
//! Submodules:
//! - `filter`: campus / provider scope.
//! - `rank`: stable total order and the `present` entry point.
//! - `markers`: availability levels, map markers and viewport fitting.

pub mod filter;
pub mod markers;
pub mod rank;

pub use filter::ScopeFilter;
pub use rank::{present, rank, RankedStation};
