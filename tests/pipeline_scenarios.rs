//! End-to-end pipeline scenarios, offline.
//!
//! Feeds wire JSON through the same conversion the HTTP client uses, then
//! reconcile -> present -> markers, and checks the orderings the list view
//! depends on.

use charger_watch::geo::{self, TransformTable};
use charger_watch::ingest::wire::{WireCatalog, WireSnapshot};
use charger_watch::model::{CoordSystem, Coordinate, DeviceCatalogEntry, LiveSnapshot, StationView};
use charger_watch::present::markers::map_markers;
use charger_watch::present::rank::present_ranked;
use charger_watch::present::{present, ScopeFilter};
use charger_watch::reconcile::{reconcile, scoped_catalog_len};
use charger_watch::watchlist::WatchlistStore;

const SNAPSHOT_JSON: &str = r#"{
    "updated_at": "2025-01-01T12:00:00+08:00",
    "stations": [
        {"provider": "neptune", "name": "Lot-1", "campus_id": 2143, "lat": 30.2701, "lon": 120.1203,
         "device_ids": [101, 102], "free": 1, "used": 7, "total": 8, "error": 0},
        {"provider": "neptune", "name": "Lot-7", "campus_id": 2143, "lat": 30.2712, "lon": 120.1221,
         "device_ids": [701], "free": 0, "used": 10, "total": 10, "error": 0},
        {"provider": "dlmm", "name": "East Gate", "campus_id": "2143", "lat": 30.2689, "lon": 120.1250,
         "device_ids": ["301"], "free": 6, "used": 2, "total": 10, "error": 2},
        {"provider": "dlmm", "name": "Library", "campus_id": 1774, "lat": 30.3021, "lon": 120.0903,
         "device_ids": [401], "free": 4, "used": 0, "total": 4, "error": 0}
    ]
}"#;

const CATALOG_JSON: &str = r#"{
    "stations": [
        {"name": "Lot-1", "devdescript": "Lot-1", "provider": "neptune", "campus_id": 2143,
         "latitude": 30.2701, "longitude": 120.1203, "devids": [101, 102]},
        {"name": "Lot-9", "devdescript": "Lot-9", "provider": "neptune", "campus_id": 2143,
         "latitude": 30.2750, "longitude": 120.1190, "devids": [901, 902]},
        {"name": "Dorm 3", "devdescript": "Dorm 3", "provider": "dlmm", "campus_id": 2143,
         "devids": [303]},
        {"name": "Sports Hall", "devdescript": "Sports Hall", "provider": "dlmm", "campus_id": 1774,
         "latitude": 30.3050, "longitude": 120.0870, "devids": [501]}
    ]
}"#;

fn load() -> (LiveSnapshot, Vec<DeviceCatalogEntry>) {
    let snapshot: WireSnapshot = serde_json::from_str(SNAPSHOT_JSON).expect("snapshot fixture");
    let catalog: WireCatalog = serde_json::from_str(CATALOG_JSON).expect("catalog fixture");
    (
        snapshot.into_snapshot(CoordSystem::Bd09),
        catalog.into_entries(CoordSystem::Bd09),
    )
}

fn names(views: &[StationView]) -> Vec<&str> {
    views.iter().map(|v| v.descriptor.as_str()).collect()
}

#[test]
fn test_yuquan_list_order() {
    let (snapshot, catalog) = load();
    let scope = ScopeFilter::new(Some("2143"), None);
    let views = reconcile(&snapshot.stations, Some(catalog.as_slice()), &scope);
    let out = present(views, Some("2143"), None, &WatchlistStore::new());

    assert_eq!(names(&out), vec!["East Gate", "Lot-1", "Lot-7", "Lot-9", "Dorm 3"]);
    assert!(out[..3].iter().all(|v| v.reported));
    assert!(out[3..].iter().all(|v| !v.reported));
}

#[test]
fn test_catalog_completeness_across_scopes() {
    let (snapshot, catalog) = load();
    for scope in [
        ScopeFilter::all(),
        ScopeFilter::new(Some("2143"), None),
        ScopeFilter::new(Some("1774"), None),
        ScopeFilter::new(None, Some("dlmm")),
    ] {
        let views = reconcile(&snapshot.stations, Some(catalog.as_slice()), &scope);
        assert!(views.len() >= scoped_catalog_len(&catalog, &scope));
        for entry in catalog.iter().filter(|e| scope.matches_entry(e)) {
            let key = entry.descriptor_key();
            let hits = views.iter().filter(|v| v.descriptor == key).count();
            assert_eq!(hits, 1, "{} appears {} times under {:?}", key, hits, scope);
        }
    }
}

#[test]
fn test_watched_full_lot_leads_list() {
    let (snapshot, catalog) = load();
    let mut watchlist = WatchlistStore::new();
    watchlist.add(&[], "Lot-7", None);

    let views = reconcile(&snapshot.stations, Some(catalog.as_slice()), &ScopeFilter::all());
    let out = present(views, None, None, &watchlist);
    assert_eq!(out[0].descriptor, "Lot-7");
    assert_eq!(out[0].free_count, 0);
}

#[test]
fn test_watch_by_device_matches_unreported_stub() {
    let (snapshot, catalog) = load();
    let mut watchlist = WatchlistStore::new();
    watchlist.add(&[902], "", Some("neptune"));

    let views = reconcile(&snapshot.stations, Some(catalog.as_slice()), &ScopeFilter::all());
    let ranked = present_ranked(views, None, None, &watchlist);
    assert_eq!(ranked[0].view.descriptor, "Lot-9");
    assert!(ranked[0].watched);
    assert!(!ranked[0].view.reported);
}

#[test]
fn test_reported_never_after_unreported_for_equal_watch_status() {
    let (snapshot, catalog) = load();
    let views = reconcile(&snapshot.stations, Some(catalog.as_slice()), &ScopeFilter::all());
    let out = present(views, None, None, &WatchlistStore::new());
    let first_stub = out.iter().position(|v| !v.reported).expect("catalog has stubs");
    assert!(out[first_stub..].iter().all(|v| !v.reported));
}

#[test]
fn test_is_watched_scenario() {
    let mut watchlist = WatchlistStore::new();
    assert!(!watchlist.is_watched(&[], "Lot-9", Some("provA")));
    watchlist.add(&[], "Lot-9", Some("provA"));
    assert!(watchlist.is_watched(&[], "Lot-9", Some("provA")));
}

#[test]
fn test_live_only_mode_without_catalog() {
    let (snapshot, _) = load();
    let views = reconcile(&snapshot.stations, None, &ScopeFilter::all());
    assert_eq!(views.len(), snapshot.stations.len());
    assert!(views.iter().all(|v| v.reported));
}

#[test]
fn test_markers_skip_stub_without_geometry_but_list_keeps_it() {
    let (snapshot, catalog) = load();
    let scope = ScopeFilter::new(Some("2143"), None);
    let views = reconcile(&snapshot.stations, Some(catalog.as_slice()), &scope);
    let ranked = present_ranked(views, Some("2143"), None, &WatchlistStore::new());
    assert!(ranked.iter().any(|r| r.view.descriptor == "Dorm 3" && !r.view.has_geometry()));

    let markers = map_markers(&ranked, &TransformTable::standard(), CoordSystem::Gcj02);
    let marked: Vec<&str> = markers.iter().map(|m| m.descriptor.as_str()).collect();
    assert_eq!(marked, vec!["East Gate", "Lot-1"]);
    assert!(markers.iter().all(|m| m.position.system == CoordSystem::Gcj02));
}

#[test]
fn test_transform_identity_and_round_trip() {
    let c = Coordinate::new(120.1203, 30.2701, CoordSystem::Bd09);
    assert_eq!(geo::convert(c, CoordSystem::Bd09), c);

    for from in CoordSystem::ALL {
        for to in CoordSystem::ALL {
            let start = Coordinate::new(120.1203, 30.2701, from);
            let back = geo::convert(geo::convert(start, to), from);
            assert!((back.lng - start.lng).abs() < 1e-4, "{} -> {} -> {}", from, to, from);
            assert!((back.lat - start.lat).abs() < 1e-4, "{} -> {} -> {}", from, to, from);
        }
    }
}
