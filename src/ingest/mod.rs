//! Upstream data: HTTP client, wire formats, snapshot cache and freshness.

pub mod api;
pub mod cache;
pub mod freshness;
pub mod wire;

pub use api::ApiClient;
pub use cache::{SnapshotCache, SnapshotOutcome, SnapshotSource};
