//! Live checks against a running status API.
//!
//! All ignored by default. Run with `cargo test --test live_api -- --ignored`
//! after setting CHARGER_API_URL (read from .env).

use charger_watch::ingest::freshness::is_stale;
use charger_watch::ingest::ApiClient;
use charger_watch::model::CoordSystem;
use charger_watch::present::ScopeFilter;
use charger_watch::reconcile::reconcile;
use std::env;
use std::time::Duration;

fn client() -> ApiClient {
    dotenv::dotenv().ok();
    let url = env::var("CHARGER_API_URL").expect("CHARGER_API_URL must be set");
    ApiClient::new(&url, None, CoordSystem::Bd09, Duration::from_secs(30)).expect("client builds")
}

#[test]
#[ignore] // Only run manually - makes real API calls
fn test_live_snapshot_reconciles_against_catalog() {
    let api = client();
    let snapshot = api.fetch_snapshot(None).expect("status endpoint");
    let catalog = api.fetch_catalog().expect("catalog endpoint");

    let views = reconcile(&snapshot.stations, Some(catalog.as_slice()), &ScopeFilter::all());
    assert!(views.len() >= snapshot.stations.len());
    println!(
        "{} live stations, {} catalog entries, {} views",
        snapshot.stations.len(),
        catalog.len(),
        views.len()
    );

    match is_stale(&snapshot.updated_at, 15) {
        Ok(stale) => println!("snapshot {} stale: {}", snapshot.updated_at, stale),
        Err(e) => println!("snapshot timestamp unparseable: {}", e),
    }
}

#[test]
#[ignore] // Only run manually - makes real API calls
fn test_live_provider_directory_and_config() {
    let api = client();
    let providers = api.fetch_providers().expect("providers endpoint");
    assert!(!providers.is_empty(), "API should list at least one provider");

    let remote = api.fetch_remote_config().expect("config endpoint");
    assert!(remote.fetch_interval.is_some_and(|s| s > 0));

    let first = &providers[0].id;
    let scoped = api.fetch_snapshot(Some(first)).expect("scoped status");
    assert!(scoped.stations.iter().all(|s| &s.provider_id == first));
}
