//! Application state and the poll controller.
//!
//! `AppState` is the single owner of everything a render depends on: scope
//! selection, active basemap, the session catalog, the snapshot cache and the
//! watchlist. Rendering is a pure function of that state; the `Controller`
//! is the only thing that mutates it (poll results, scope changes, toggles).

use crate::basemaps::{self, Basemap};
use crate::campuses;
use crate::config::AppConfig;
use crate::error::EngineError;
use crate::geo::distance;
use crate::geo::TransformTable;
use crate::ingest::freshness::is_stale_at;
use crate::ingest::{ApiClient, SnapshotCache, SnapshotOutcome, SnapshotSource};
use crate::logging::{self, Component};
use crate::model::{CoordSystem, Coordinate, DeviceCatalogEntry, LiveSnapshot, ProviderInfo, StationView};
use crate::present::markers::{fit_view, map_markers, MapView, Marker};
use crate::present::rank::present_scoped;
use crate::present::{RankedStation, ScopeFilter};
use crate::reconcile::reconcile;
use crate::watchlist::slot::KvSlot;
use crate::watchlist::{WatchToggle, WatchlistStore};
use chrono::{DateTime, Utc};
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

pub struct AppState {
    pub scope: ScopeFilter,
    pub basemap: &'static Basemap,
    /// Reference system the providers report in.
    pub data_system: CoordSystem,
    /// Loaded once per session; `None` until the first successful fetch.
    pub catalog: Option<Vec<DeviceCatalogEntry>>,
    pub cache: SnapshotCache,
    /// Snapshot the next render uses. Cleared when no data is available.
    pub current: Option<LiveSnapshot>,
    pub providers: Vec<ProviderInfo>,
    pub watchlist: WatchlistStore,
    pub stale_after_minutes: u64,
}

impl AppState {
    pub fn new(data_system: CoordSystem, basemap: &'static Basemap, watchlist: WatchlistStore) -> Self {
        AppState {
            scope: ScopeFilter::all(),
            basemap,
            data_system,
            catalog: None,
            cache: SnapshotCache::new(),
            current: None,
            providers: Vec::new(),
            watchlist,
            stale_after_minutes: crate::config::DEFAULT_STALE_AFTER_MINUTES,
        }
    }

    pub fn from_config(config: &AppConfig, watchlist: WatchlistStore) -> Self {
        let basemap = basemaps::find_basemap(&config.basemap).unwrap_or_else(basemaps::default_basemap);
        let mut state = AppState::new(config.data_coord_system, basemap, watchlist);
        if let Some(path) = &config.cache_file {
            state.cache = SnapshotCache::with_file(path);
            state.current = state.cache.last().cloned();
        }
        state.stale_after_minutes = config.stale_after_minutes;
        state
    }

    /// Marker placement happens in the active basemap's system.
    pub fn working_system(&self) -> CoordSystem {
        self.basemap.coord_system
    }

    /// Every station of the session, unscoped and unordered.
    pub fn session_views(&self) -> Vec<StationView> {
        let live = self.current.as_ref().map(|s| s.stations.as_slice()).unwrap_or(&[]);
        reconcile(live, self.catalog.as_deref(), &ScopeFilter::all())
    }
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

/// Everything the list and map need for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub rows: Vec<RankedStation>,
    pub markers: Vec<Marker>,
    pub view: MapView,
    pub working_system: CoordSystem,
    pub updated_at: Option<String>,
    /// Unparseable or missing timestamps count as stale.
    pub stale: bool,
}

/// Reconcile, filter & rank, then place markers. Pure over `state`.
pub fn render(state: &AppState, table: &TransformTable, now: DateTime<Utc>) -> Presentation {
    let live = state.current.as_ref().map(|s| s.stations.as_slice()).unwrap_or(&[]);
    let views = reconcile(live, state.catalog.as_deref(), &state.scope);
    let rows = present_scoped(views, &state.scope, &state.watchlist);

    let working = state.working_system();
    let markers = map_markers(&rows, table, working);
    let campus = state.scope.campus_id.as_deref().and_then(campuses::find_campus);
    let view = fit_view(&markers, campus, table, working);

    let updated_at = state.current.as_ref().map(|s| s.updated_at.clone());
    let stale = match &updated_at {
        Some(ts) => is_stale_at(ts, state.stale_after_minutes, now).unwrap_or(true),
        None => true,
    };

    Presentation {
        rows,
        markers,
        view,
        working_system: working,
        updated_at,
        stale,
    }
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub source: SnapshotSource,
    /// User-visible notice (throttling, cached data, no data).
    pub notice: Option<String>,
    pub presentation: Presentation,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct Controller {
    api: ApiClient,
    slot: Box<dyn KvSlot>,
    table: TransformTable,
    state: AppState,
}

impl Controller {
    pub fn new(api: ApiClient, slot: Box<dyn KvSlot>, state: AppState) -> Self {
        Controller {
            api,
            slot,
            table: TransformTable::standard(),
            state,
        }
    }

    /// Loads the watchlist from `slot` and builds state from `config`.
    pub fn from_config(config: &AppConfig, api: ApiClient, slot: Box<dyn KvSlot>) -> Self {
        let watchlist = WatchlistStore::load(slot.as_ref());
        let state = AppState::from_config(config, watchlist);
        Controller::new(api, slot, state)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn table(&self) -> &TransformTable {
        &self.table
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Populates the provider scope options. Failure leaves the list empty.
    pub fn load_providers(&mut self) -> &[ProviderInfo] {
        match self.api.fetch_providers() {
            Ok(providers) => {
                logging::info(Component::Providers, None, &format!("{} providers available", providers.len()));
                self.state.providers = providers;
            }
            Err(e) => logging::log_fetch_failure(Component::Providers, "provider directory", &e),
        }
        &self.state.providers
    }

    /// One poll cycle: fetch the snapshot and, until loaded, the catalog in
    /// parallel, then fold both into state and render.
    pub fn refresh(&mut self) -> PollOutcome {
        let need_catalog = self.state.catalog.is_none();
        let api = &self.api;

        let (snapshot, catalog) = thread::scope(|s| {
            let catalog_task = if need_catalog {
                Some(s.spawn(|| api.fetch_catalog()))
            } else {
                None
            };
            let snapshot = api.fetch_snapshot(None);
            let catalog = catalog_task.map(|task| {
                task.join()
                    .unwrap_or_else(|_| Err(EngineError::fetch_failed("catalog", "catalog worker panicked")))
            });
            (snapshot, catalog)
        });

        match snapshot {
            Err(e) if !e.is_rate_limited() => {
                logging::log_fetch_failure(Component::Snapshot, "status fetch", &e);
                match api.fetch_mirror_snapshot() {
                    Ok(mirror) => {
                        logging::info(Component::Snapshot, None, "using the published latest.json mirror");
                        self.ingest_mirror(mirror, e, catalog)
                    }
                    Err(mirror_err) => {
                        logging::log_fetch_failure(Component::Snapshot, "mirror fetch", &mirror_err);
                        self.ingest(Err(e), catalog)
                    }
                }
            }
            other => self.ingest(other, catalog),
        }
    }

    /// Folds fetch results into state and renders.
    ///
    /// `catalog` is `None` when no catalog fetch was attempted this cycle.
    pub fn ingest(
        &mut self,
        snapshot: Result<LiveSnapshot, EngineError>,
        catalog: Option<Result<Vec<DeviceCatalogEntry>, EngineError>>,
    ) -> PollOutcome {
        self.ingest_catalog(catalog);
        let outcome = self.state.cache.resolve(snapshot);
        if let SnapshotOutcome::RateLimited(e) = &outcome {
            logging::log_fetch_failure(Component::Snapshot, "status fetch", e);
        }
        self.apply(outcome)
    }

    /// Like `ingest`, for a mirror snapshot recovered after the status
    /// endpoint failed with `status_error`. The render is flagged as mirror
    /// data.
    pub fn ingest_mirror(
        &mut self,
        mirror: LiveSnapshot,
        status_error: EngineError,
        catalog: Option<Result<Vec<DeviceCatalogEntry>, EngineError>>,
    ) -> PollOutcome {
        self.ingest_catalog(catalog);
        let outcome = self.state.cache.resolve_mirror(mirror, status_error);
        self.apply(outcome)
    }

    fn ingest_catalog(&mut self, catalog: Option<Result<Vec<DeviceCatalogEntry>, EngineError>>) {
        match catalog {
            Some(Ok(entries)) => self.state.catalog = Some(entries),
            Some(Err(e)) => {
                logging::log_fetch_failure(Component::Catalog, "catalog fetch", &e);
                logging::warn(Component::Catalog, None, "running live-only until the catalog loads");
            }
            None => {}
        }
    }

    fn apply(&mut self, outcome: SnapshotOutcome) -> PollOutcome {
        self.state.current = outcome.snapshot().cloned();
        PollOutcome {
            source: outcome.source(),
            notice: outcome.notice(),
            presentation: self.render(),
        }
    }

    pub fn render(&self) -> Presentation {
        render(&self.state, &self.table, Utc::now())
    }

    /// Selects a campus; `None` or blank shows all.
    pub fn set_campus(&mut self, campus_id: Option<&str>) {
        let scope = ScopeFilter::new(campus_id, self.state.scope.provider_id.as_deref());
        if let Some(id) = scope.campus_id.as_deref() {
            if campuses::find_campus(id).is_none() {
                logging::warn(Component::Pipeline, None, &format!("campus '{}' is not in the registry", id));
            }
        }
        self.state.scope = scope;
    }

    /// Selects a provider; `None` or blank shows all.
    pub fn set_provider(&mut self, provider_id: Option<&str>) {
        let scope = ScopeFilter::new(self.state.scope.campus_id.as_deref(), provider_id);
        if let Some(id) = scope.provider_id.as_deref() {
            let known = self.state.providers.is_empty() || self.state.providers.iter().any(|p| p.id == id);
            if !known {
                logging::warn(Component::Providers, None, &format!("provider '{}' is not in the directory", id));
            }
        }
        self.state.scope = scope;
    }

    /// Switches the tile backend, which changes the working system. Unknown
    /// ids keep the current backend.
    pub fn switch_basemap(&mut self, id: &str) -> bool {
        match basemaps::find_basemap(id) {
            Some(basemap) => {
                logging::info(
                    Component::Transform,
                    None,
                    &format!("basemap {} ({})", basemap.name, basemap.coord_system),
                );
                self.state.basemap = basemap;
                true
            }
            None => {
                logging::warn(Component::Transform, None, &format!("unknown basemap '{}'", id));
                false
            }
        }
    }

    /// Toggles the station named `descriptor`, resolving its device ids and
    /// provider from session data, and persists immediately.
    pub fn toggle_watch(&mut self, descriptor: &str) -> WatchToggle {
        let views = self.state.session_views();
        match views.iter().find(|v| v.descriptor == descriptor) {
            Some(view) => self.toggle_watch_view(view),
            None => {
                logging::debug(Component::Watchlist, Some(descriptor), "not in session data, toggling by name");
                self.apply_toggle(&[], descriptor, None)
            }
        }
    }

    pub fn toggle_watch_view(&mut self, view: &StationView) -> WatchToggle {
        let provider = Some(view.provider_id.as_str()).filter(|p| !p.is_empty());
        self.apply_toggle(&view.device_ids, &view.descriptor, provider)
    }

    fn apply_toggle(&mut self, device_ids: &[i64], descriptor: &str, provider: Option<&str>) -> WatchToggle {
        let result = self.state.watchlist.toggle(device_ids, descriptor, provider);
        if let Err(e) = self.state.watchlist.persist(self.slot.as_ref()) {
            logging::error(Component::Watchlist, Some(descriptor), &format!("cannot persist watchlist: {}", e));
        }
        logging::info(Component::Watchlist, Some(descriptor), &format!("{:?}", result));
        result
    }

    /// Closest presented stations to a WGS84 fix, nearest first.
    pub fn nearest_to(&self, user_wgs84: Coordinate, limit: usize) -> Vec<(StationView, f64)> {
        let rows: Vec<StationView> = self.render().rows.into_iter().map(|r| r.view).collect();
        distance::nearest(&self.table, &rows, user_wgs84, self.state.working_system(), limit)
            .into_iter()
            .map(|(v, d)| (v.clone(), d))
            .collect()
    }

    /// Polls every `interval`. `cycles` bounds the loop for one-shot and
    /// test runs; `None` polls forever. A failed cycle never ends the loop.
    pub fn run<F>(&mut self, interval: Duration, cycles: Option<usize>, mut on_poll: F)
    where
        F: FnMut(&PollOutcome),
    {
        let mut done = 0usize;
        loop {
            let outcome = self.refresh();
            on_poll(&outcome);
            done += 1;
            if cycles.is_some_and(|n| done >= n) {
                break;
            }
            thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LiveStationStatus;
    use crate::watchlist::slot::MemorySlot;
    use crate::watchlist::WATCHLIST_SLOT_KEY;

    fn live(descriptor: &str, campus: &str, provider: &str, free: u32, ids: Vec<i64>) -> LiveStationStatus {
        LiveStationStatus {
            descriptor: descriptor.to_string(),
            device_ids: ids,
            provider_id: provider.to_string(),
            provider_name: provider.to_string(),
            campus_id: Some(campus.to_string()),
            coordinate: Some(Coordinate::new(120.12, 30.27, CoordSystem::Bd09)),
            free_count: free,
            used_count: 0,
            total_count: free,
            error_count: 0,
        }
    }

    fn entry(descriptor: &str, campus: &str, id: i64) -> DeviceCatalogEntry {
        DeviceCatalogEntry {
            device_id: Some(id),
            provider_id: "neptune".to_string(),
            provider_name: "neptune".to_string(),
            campus_id: Some(campus.to_string()),
            descriptor: Some(descriptor.to_string()),
            name: None,
            coordinate: None,
        }
    }

    fn snapshot(stations: Vec<LiveStationStatus>) -> LiveSnapshot {
        LiveSnapshot {
            updated_at: Utc::now().to_rfc3339(),
            stations,
        }
    }

    /// Points at the discard port; tests below never call `refresh`.
    fn offline_controller() -> Controller {
        let api = ApiClient::new("http://127.0.0.1:9", None, CoordSystem::Bd09, Duration::from_secs(1))
            .expect("client builds");
        let state = AppState::new(CoordSystem::Bd09, basemaps::default_basemap(), WatchlistStore::new());
        Controller::new(api, Box::new(MemorySlot::new()), state)
    }

    fn descriptors(p: &Presentation) -> Vec<&str> {
        p.rows.iter().map(|r| r.view.descriptor.as_str()).collect()
    }

    #[test]
    fn test_ingest_renders_reconciled_and_ranked_rows() {
        let mut c = offline_controller();
        let out = c.ingest(
            Ok(snapshot(vec![live("d2", "2143", "neptune", 3, vec![2])])),
            Some(Ok(vec![entry("d1", "2143", 1)])),
        );
        assert_eq!(out.source, SnapshotSource::Live);
        assert!(out.notice.is_none());
        assert_eq!(descriptors(&out.presentation), vec!["d2", "d1"]);
        assert_eq!(out.presentation.markers.len(), 1);
        assert!(!out.presentation.stale);
    }

    #[test]
    fn test_failed_fetch_uses_cache_then_no_data() {
        let mut c = offline_controller();
        let failed = || Err(EngineError::fetch_failed("status", "timeout"));

        let out = c.ingest(failed(), None);
        assert_eq!(out.source, SnapshotSource::None);
        assert!(out.presentation.rows.is_empty());

        c.ingest(Ok(snapshot(vec![live("a", "2143", "neptune", 1, vec![])])), None);
        let out = c.ingest(failed(), None);
        assert_eq!(out.source, SnapshotSource::Cache);
        assert_eq!(descriptors(&out.presentation), vec!["a"]);
    }

    #[test]
    fn test_rate_limit_renders_catalog_only_with_notice() {
        let mut c = offline_controller();
        c.ingest(
            Ok(snapshot(vec![live("a", "2143", "neptune", 1, vec![])])),
            Some(Ok(vec![entry("b", "2143", 5)])),
        );
        let out = c.ingest(
            Err(EngineError::RateLimited {
                endpoint: "status".to_string(),
                retry_after_secs: None,
            }),
            None,
        );
        assert!(out.notice.is_some());
        assert_eq!(descriptors(&out.presentation), vec!["b"]);
        assert!(out.presentation.rows.iter().all(|r| !r.view.reported));
    }

    #[test]
    fn test_mirror_snapshot_is_reported_as_mirror_with_notice() {
        let mut c = offline_controller();
        let out = c.ingest_mirror(
            snapshot(vec![live("a", "2143", "neptune", 2, vec![])]),
            EngineError::fetch_failed("status", "HTTP 502"),
            Some(Ok(vec![entry("b", "2143", 5)])),
        );
        assert_eq!(out.source, SnapshotSource::Mirror);
        assert!(out.notice.is_some());
        assert_eq!(descriptors(&out.presentation), vec!["a", "b"]);

        let out = c.ingest(Err(EngineError::fetch_failed("status", "timeout")), None);
        assert_eq!(out.source, SnapshotSource::Cache);
        assert_eq!(descriptors(&out.presentation), vec!["a", "b"]);
    }

    #[test]
    fn test_catalog_failure_runs_live_only() {
        let mut c = offline_controller();
        let out = c.ingest(
            Ok(snapshot(vec![live("a", "2143", "neptune", 1, vec![])])),
            Some(Err(EngineError::fetch_failed("catalog", "HTTP 503"))),
        );
        assert!(c.state().catalog.is_none());
        assert_eq!(descriptors(&out.presentation), vec!["a"]);
    }

    #[test]
    fn test_scope_changes_apply_on_next_render() {
        let mut c = offline_controller();
        c.ingest(
            Ok(snapshot(vec![
                live("yq", "2143", "neptune", 1, vec![]),
                live("zjg", "1774", "dlmm", 4, vec![]),
            ])),
            None,
        );
        c.set_campus(Some("1774"));
        assert_eq!(descriptors(&c.render()), vec!["zjg"]);
        c.set_provider(Some("neptune"));
        assert!(c.render().rows.is_empty());
        c.set_campus(Some(""));
        assert_eq!(descriptors(&c.render()), vec!["yq"]);
    }

    #[test]
    fn test_switch_basemap_changes_working_system() {
        let mut c = offline_controller();
        c.ingest(Ok(snapshot(vec![live("a", "2143", "neptune", 3, vec![])])), None);
        assert_eq!(c.render().working_system, CoordSystem::Gcj02);

        assert!(c.switch_basemap("baidu"));
        let p = c.render();
        assert_eq!(p.working_system, CoordSystem::Bd09);
        assert_eq!((p.markers[0].position.lng, p.markers[0].position.lat), (120.12, 30.27));

        assert!(!c.switch_basemap("bing"));
        assert_eq!(c.render().working_system, CoordSystem::Bd09);
    }

    #[test]
    fn test_toggle_resolves_provider_and_persists() {
        let mut c = offline_controller();
        c.ingest(
            Ok(snapshot(vec![
                live("busy", "2143", "neptune", 0, vec![7, 8]),
                live("open", "2143", "neptune", 5, vec![9]),
            ])),
            None,
        );
        assert_eq!(c.toggle_watch("busy"), WatchToggle::Added);
        assert!(c.state().watchlist.is_watched(&[8], "", Some("neptune")));
        assert_eq!(descriptors(&c.render()), vec!["busy", "open"]);

        let stored = c.slot.read(WATCHLIST_SLOT_KEY).expect("slot readable").expect("persisted");
        assert!(stored.contains("\"busy\""));

        assert_eq!(c.toggle_watch("busy"), WatchToggle::Removed);
        assert_eq!(descriptors(&c.render()), vec!["open", "busy"]);
    }

    #[test]
    fn test_toggle_unknown_descriptor_is_name_only() {
        let mut c = offline_controller();
        assert_eq!(c.toggle_watch("Lot-9"), WatchToggle::Added);
        assert!(c.state().watchlist.is_watched(&[], "Lot-9", None));
        assert_eq!(c.state().watchlist.devices().count(), 0);
    }

    #[test]
    fn test_missing_timestamp_is_stale() {
        let mut c = offline_controller();
        let mut snap = snapshot(vec![]);
        snap.updated_at = String::new();
        let out = c.ingest(Ok(snap), None);
        assert!(out.presentation.stale);
    }

    #[test]
    fn test_nearest_to_orders_by_distance() {
        let mut c = offline_controller();
        let mut far = live("far", "1774", "neptune", 1, vec![]);
        far.coordinate = Some(Coordinate::new(120.089946, 30.299196, CoordSystem::Bd09));
        c.ingest(Ok(snapshot(vec![far, live("near", "2143", "neptune", 1, vec![])])), None);
        let user = Coordinate::new(120.108, 30.264, CoordSystem::Wgs84);
        let found = c.nearest_to(user, 5);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0.descriptor, "near");
        assert!(found[0].1 < found[1].1);
    }
}
