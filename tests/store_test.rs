mod helpers;

use helpers::{date, pacific, record};
use hooter::streak::store::StreakStore;
use hooter::streak::{Population, StoreError};
use tempfile::TempDir;

fn population() -> Population {
    let mut pop = Population::new();
    pop.insert("1236".into(), record("alice", 3, 9, Some(date(2024, 6, 1))));
    let mut bob = record("bob", 0, 0, None);
    bob.join_time = Some(pacific(2024, 6, 1, 20, 55));
    pop.insert("77".into(), bob);
    pop.insert("5".into(), record("carol", 1, 1, Some(date(2024, 5, 30))));
    pop
}

#[test]
fn save_load_round_trip_is_exact() {
    let tmp = TempDir::new().unwrap();
    let store = StreakStore::new(tmp.path().join("streaks.json"));
    let pop = population();

    store.save(&pop).unwrap();
    let loaded = store.load().unwrap();
    assert_eq!(loaded, pop);

    // And again: save(load(x)) == x
    store.save(&loaded).unwrap();
    assert_eq!(store.load().unwrap(), pop);
}

#[test]
fn persisted_layout_uses_iso_dates_and_nulls() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    let store = StreakStore::new(&path);
    store.save(&population()).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["1236"]["last_join_date"], "2024-06-01");
    assert!(raw["1236"]["join_time"].is_null());
    assert!(raw["77"]["last_join_date"].is_null());
    let join_time = raw["77"]["join_time"].as_str().unwrap();
    assert!(join_time.starts_with("2024-06-02T03:55:00"));
}

#[test]
fn crash_before_rename_keeps_previous_content() {
    let tmp = TempDir::new().unwrap();
    let store = StreakStore::new(tmp.path().join("streaks.json"));
    let before = population();
    store.save(&before).unwrap();

    let mut after = before.clone();
    after.get_mut("1236").unwrap().current_streak = 4;

    // Stage the new content but "crash" before the rename.
    let staged = store.stage(&after).unwrap();
    assert!(staged.temp_path().exists());
    drop(staged);

    assert_eq!(store.load().unwrap(), before);

    // The next save simply replaces the leftover temp file.
    store.save(&after).unwrap();
    assert_eq!(store.load().unwrap(), after);
    assert!(!store.temp_path().exists());
}

#[test]
fn commit_after_stage_exposes_new_content() {
    let tmp = TempDir::new().unwrap();
    let store = StreakStore::new(tmp.path().join("streaks.json"));
    store.save(&population()).unwrap();

    let mut after = population();
    after.insert("9".into(), record("dan", 0, 0, None));
    store.stage(&after).unwrap().commit().unwrap();

    assert_eq!(store.load().unwrap(), after);
}

#[test]
fn half_written_temp_file_is_never_loaded() {
    let tmp = TempDir::new().unwrap();
    let store = StreakStore::new(tmp.path().join("streaks.json"));
    let pop = population();
    store.save(&pop).unwrap();

    std::fs::write(store.temp_path(), b"{\"1236\": {\"username\": \"ali").unwrap();
    assert_eq!(store.load().unwrap(), pop);
}

#[test]
fn corrupt_file_recovers_as_empty() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    std::fs::write(&path, b"not json at all").unwrap();

    let store = StreakStore::new(&path);
    assert!(store.load().unwrap().is_empty());

    // Saving afterwards works normally.
    store.save(&population()).unwrap();
    assert_eq!(store.load().unwrap().len(), 3);
}

#[test]
fn legacy_file_without_join_time_loads() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    std::fs::write(
        &path,
        r#"{
    "1": {"username": "old", "current_streak": 2, "longest_streak": 2, "last_join_date": "2024-05-01T21:40:02.512345"}
}"#,
    )
    .unwrap();

    let pop = StreakStore::new(&path).load().unwrap();
    assert_eq!(pop["1"].last_join_date, Some(date(2024, 5, 1)));
    assert!(pop["1"].join_time.is_none());
}

#[test]
fn legacy_file_with_open_session_keeps_every_user() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    std::fs::write(
        &path,
        r#"{
    "1": {"username": "ann", "current_streak": 4, "longest_streak": 6, "last_join_date": "2024-05-01T21:40:02.512345", "join_time": null},
    "2": {"username": "ben", "current_streak": 2, "longest_streak": 2, "last_join_date": "2024-05-01", "join_time": "2024-05-02T20:01:02.123456"}
}"#,
    )
    .unwrap();

    let store = StreakStore::new(&path);
    let pop = store.load().unwrap();
    assert_eq!(pop.len(), 2);
    assert_eq!(pop["1"].current_streak, 4);
    let joined = pop["2"].join_time.unwrap();
    assert_eq!(joined.to_rfc3339(), "2024-05-02T20:01:02.123456+00:00");

    // Re-saving writes the normalized form and loads back identically.
    store.save(&pop).unwrap();
    assert_eq!(store.load().unwrap(), pop);
}

#[test]
fn unwritable_location_is_an_io_error() {
    let tmp = TempDir::new().unwrap();
    // A regular file where the parent directory should be.
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let store = StreakStore::new(blocker.join("streaks.json"));

    let err = store.save(&population()).unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
}
