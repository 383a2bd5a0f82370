//! Watchlist persistence through the durable slots.
//!
//! File-slot tests run offline against a temp directory. The postgres test
//! is ignored by default and needs DATABASE_URL (read from .env).

use charger_watch::watchlist::slot::{FileSlot, KvSlot, PostgresSlot};
use charger_watch::watchlist::{WatchToggle, WatchlistStore, WATCHLIST_SLOT_KEY};
use std::env;
use std::fs;

#[test]
fn test_file_slot_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");

    {
        let slot = FileSlot::new(dir.path());
        let mut store = WatchlistStore::load(&slot);
        assert!(store.is_empty());
        store.add(&[101, 102], "Lot-1", Some("neptune"));
        store.add(&[], "Lot-7", None);
        store.persist(&slot).expect("persist");
    }

    let slot = FileSlot::new(dir.path());
    let store = WatchlistStore::load(&slot);
    assert!(store.is_watched(&[102], "", Some("neptune")));
    assert!(!store.is_watched(&[102], "", Some("dlmm")));
    assert!(store.is_watched(&[], "Lot-7", None));
}

#[test]
fn test_toggle_then_persist_removes_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let slot = FileSlot::new(dir.path());

    let mut store = WatchlistStore::new();
    assert_eq!(store.toggle(&[5], "Gym", Some("dlmm")), WatchToggle::Added);
    store.persist(&slot).expect("persist");
    assert_eq!(store.toggle(&[5], "Gym", Some("dlmm")), WatchToggle::Removed);
    store.persist(&slot).expect("persist");

    assert!(WatchlistStore::load(&slot).is_empty());
}

#[test]
fn test_corrupt_file_loads_empty_and_is_overwritten() {
    let dir = tempfile::tempdir().expect("tempdir");
    let slot = FileSlot::new(dir.path());
    fs::write(dir.path().join(format!("{}.json", WATCHLIST_SLOT_KEY)), "{{{ not json").expect("write");

    let mut store = WatchlistStore::load(&slot);
    assert!(store.is_empty());

    store.add(&[], "Lot-9", None);
    store.persist(&slot).expect("persist");
    let raw = slot.read(WATCHLIST_SLOT_KEY).expect("read").expect("present");
    assert!(raw.contains("Lot-9"));
}

#[test]
#[ignore] // Needs a postgres database - run with `--ignored` and DATABASE_URL set
fn test_postgres_slot_round_trip() {
    dotenv::dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let slot = PostgresSlot::connect(&database_url).expect("connect");

    let key = "charger_watchlist_integration_test";
    slot.write(key, "{\"devids\":[],\"devdescripts\":[\"Lot-1\"]}").expect("write");
    slot.write(key, "{\"devids\":[],\"devdescripts\":[\"Lot-2\"]}").expect("upsert");
    let value = slot.read(key).expect("read").expect("row present");
    assert!(value.contains("Lot-2"));
    assert!(slot.read("charger_watchlist_never_written").expect("read").is_none());
}
