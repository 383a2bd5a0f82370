//! Catalog reconciliation.
//!
//! Merges one live snapshot with the static device catalog so that every
//! known station appears exactly once: live statuses carry their counts
//! verbatim, and catalog entries absent from the snapshot become
//! not-reporting stubs.
//!
//! Station identity is the descriptor (`descriptor ?? name` for catalog
//! entries). Several catalog entries sharing a descriptor describe one
//! station and collapse into a single stub carrying all of their device ids.
//! The live index spans every provider and campus, so a live `Gate` from one
//! provider suppresses a catalog `Gate` from another. Under a provider scope
//! the live view is then filtered out too and neither shows.
//!
//! Records without a coordinate are kept. They are excluded later from map
//! placement and distance queries, never here.

use crate::logging::{self, Component};
use crate::model::{DeviceCatalogEntry, LiveStationStatus, StationView};
use crate::present::ScopeFilter;
use std::collections::{HashMap, HashSet};

/// Reconciles `live` against `catalog` under `scope`.
///
/// Live statuses are emitted in snapshot order, followed by stubs in
/// catalog order. Only catalog entries are scope-checked here; the live
/// side is narrowed by the presentation filters.
///
/// A missing catalog (`None`) runs in live-only mode.
pub fn reconcile(
    live: &[LiveStationStatus],
    catalog: Option<&[DeviceCatalogEntry]>,
    scope: &ScopeFilter,
) -> Vec<StationView> {
    let mut views: Vec<StationView> = Vec::with_capacity(live.len());
    let mut live_index: HashSet<&str> = HashSet::with_capacity(live.len());

    for status in live {
        if !live_index.insert(status.descriptor.as_str()) {
            logging::debug(
                Component::Pipeline,
                Some(&status.descriptor),
                "duplicate descriptor in snapshot, keeping the first",
            );
            continue;
        }
        views.push(StationView::from_live(status));
    }
    let reported = views.len();

    let mut missing_identity = 0usize;
    if let Some(catalog) = catalog {
        // Group absent entries by descriptor, preserving first-seen order.
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<&DeviceCatalogEntry>> = HashMap::new();

        for entry in catalog.iter().filter(|e| scope.matches_entry(e)) {
            let key = entry.descriptor_key();
            if live_index.contains(key.as_str()) {
                continue;
            }
            if entry.is_missing_identity() {
                missing_identity += 1;
                logging::debug(
                    Component::Catalog,
                    Some(&key),
                    "catalog entry has no descriptor or name",
                );
            }
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(entry);
        }

        for key in order {
            if let Some(entries) = groups.remove(&key) {
                views.push(StationView::unreported(key, &entries));
            }
        }
    }

    let unreported = views.len() - reported;
    let malformed = views.iter().filter(|v| !v.has_geometry()).count() + missing_identity;
    logging::log_reconcile_summary(reported, unreported, malformed);

    views
}

/// Number of catalog entries `scope` selects. Reconciliation output always
/// covers each of them exactly once.
pub fn scoped_catalog_len(catalog: &[DeviceCatalogEntry], scope: &ScopeFilter) -> usize {
    catalog.iter().filter(|e| scope.matches_entry(e)).count()
}
