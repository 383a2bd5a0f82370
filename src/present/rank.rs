//! Presentation order over reconciled stations.
//!
//! Keys, primary first:
//!   1. watched before unwatched
//!   2. reported before not reporting
//!   3. more free chargers first
//!
//! The sort is stable. Records equal on all three keys keep the order they
//! came out of reconciliation, so re-rendering the same input never shuffles
//! rows.

use super::filter::{filter_by_campus, filter_by_provider, ScopeFilter};
use crate::model::StationView;
use crate::watchlist::WatchlistStore;
use std::cmp::Ordering;

/// A ranked record together with its watch flag, for list rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedStation {
    pub view: StationView,
    pub watched: bool,
}

fn compare(a: &RankedStation, b: &RankedStation) -> Ordering {
    b.watched
        .cmp(&a.watched)
        .then_with(|| b.view.reported.cmp(&a.view.reported))
        .then_with(|| b.view.free_count.cmp(&a.view.free_count))
}

/// Orders views without filtering. Watch status is evaluated once per view.
pub fn rank(views: Vec<StationView>, watchlist: &WatchlistStore) -> Vec<RankedStation> {
    let mut ranked: Vec<RankedStation> = views
        .into_iter()
        .map(|view| {
            let watched = watchlist.is_watched(&view.device_ids, &view.descriptor, Some(&view.provider_id));
            RankedStation { view, watched }
        })
        .collect();
    ranked.sort_by(compare);
    ranked
}

/// Campus filter, provider filter, then the total order.
pub fn present(
    views: Vec<StationView>,
    campus_scope: Option<&str>,
    provider_scope: Option<&str>,
    watchlist: &WatchlistStore,
) -> Vec<StationView> {
    present_ranked(views, campus_scope, provider_scope, watchlist)
        .into_iter()
        .map(|r| r.view)
        .collect()
}

/// Same as `present` but keeps the watch flag on each row.
pub fn present_ranked(
    views: Vec<StationView>,
    campus_scope: Option<&str>,
    provider_scope: Option<&str>,
    watchlist: &WatchlistStore,
) -> Vec<RankedStation> {
    let views = filter_by_campus(views, campus_scope);
    let views = filter_by_provider(views, provider_scope);
    rank(views, watchlist)
}

pub fn present_scoped(views: Vec<StationView>, scope: &ScopeFilter, watchlist: &WatchlistStore) -> Vec<RankedStation> {
    present_ranked(views, scope.campus_id.as_deref(), scope.provider_id.as_deref(), watchlist)
}
