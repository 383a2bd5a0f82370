//! Charger occupancy engine.
//!
//! Reconciles live charger telemetry with the static device catalog for the
//! Yuquan and Zijingang campuses, orders the result by watchlist, reporting
//! state and free chargers, and projects station coordinates into whatever
//! reference system the active map backend uses.
//!
//! Data flows one way:
//!
//! ```text
//! snapshot + catalog -> reconcile -> filter & rank -> markers / list rows
//! ```
//!
//! The watchlist is read by the ranker and mutated by user toggles; the
//! geodetic transform is used for marker placement and distance queries.

pub mod app;
pub mod basemaps;
pub mod campuses;
pub mod config;
pub mod error;
pub mod geo;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod present;
pub mod reconcile;
pub mod watchlist;
