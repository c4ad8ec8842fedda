mod common;

use std::fs;
use std::sync::Arc;
use std::thread;

use common::items;
use groupsnap_core::GroupState;
use groupsnap_engine::{QueueStore, StoreError, STORE_FILENAME};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn group_with(urls: &[&str]) -> GroupState {
    let mut state = GroupState::new("42", "Road Trip", "tok");
    state.extend_items(items(urls));
    state
}

fn pending_urls(store: &QueueStore, group_id: &str) -> Vec<String> {
    store
        .get_group(group_id)
        .map(|g| g.pending_items.into_iter().map(|i| i.url).collect())
        .unwrap_or_default()
}

#[test]
fn creates_missing_state_dir_and_starts_empty() {
    groupsnap_logging::initialize_for_tests();
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("state");

    let store = QueueStore::open(&dir).unwrap();
    assert!(dir.is_dir());
    assert!(store.get_group("42").is_none());
    assert!(store.get_token().is_none());
    assert!(store.group_ids().is_empty());
}

#[test]
fn group_survives_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let store = QueueStore::open(temp.path()).unwrap();
        store.create_group(group_with(&["u1", "u2", "u3"])).unwrap();
    }
    assert!(temp.path().join(STORE_FILENAME).is_file());

    let reopened = QueueStore::open(temp.path()).unwrap();
    let group = reopened.get_group("42").unwrap();
    assert_eq!(group.group_name, "Road Trip");
    assert_eq!(group.token, "tok");
    assert_eq!(pending_urls(&reopened, "42"), vec!["u1", "u2", "u3"]);
    assert_eq!(reopened.group_ids(), vec!["42".to_string()]);
}

#[test]
fn create_group_drops_duplicate_urls() {
    let temp = TempDir::new().unwrap();
    let store = QueueStore::open(temp.path()).unwrap();
    let mut state = GroupState::new("42", "g", "tok");
    state.pending_items = items(&["u1", "u2", "u1"]);

    let stored = store.create_group(state).unwrap();
    assert_eq!(stored.pending_items.len(), 2);
    assert_eq!(pending_urls(&store, "42"), vec!["u1", "u2"]);
}

#[test]
fn removal_is_keyed_persisted_and_idempotent() {
    let temp = TempDir::new().unwrap();
    let store = QueueStore::open(temp.path()).unwrap();
    store.create_group(group_with(&["u1", "u2", "u3"])).unwrap();

    assert!(store.remove_media_item("42", "u2").unwrap());
    assert!(!store.remove_media_item("42", "u2").unwrap());
    assert!(!store.remove_media_item("absent-group", "u1").unwrap());

    let reopened = QueueStore::open(temp.path()).unwrap();
    assert_eq!(pending_urls(&reopened, "42"), vec!["u1", "u3"]);
}

#[test]
fn drained_group_is_kept_as_empty_record() {
    let temp = TempDir::new().unwrap();
    let store = QueueStore::open(temp.path()).unwrap();
    store.create_group(group_with(&["u1"])).unwrap();
    store.remove_media_item("42", "u1").unwrap();

    let reopened = QueueStore::open(temp.path()).unwrap();
    let group = reopened.get_group("42").expect("record kept");
    assert!(group.is_drained());
}

#[test]
fn delete_group_requires_existing_record() {
    let temp = TempDir::new().unwrap();
    let store = QueueStore::open(temp.path()).unwrap();
    store.create_group(group_with(&["u1"])).unwrap();

    assert!(store.delete_group("42").unwrap());
    assert!(!store.delete_group("42").unwrap());
    assert!(QueueStore::open(temp.path()).unwrap().get_group("42").is_none());
}

#[test]
fn token_is_independent_of_groups() {
    let temp = TempDir::new().unwrap();
    {
        let store = QueueStore::open(temp.path()).unwrap();
        store.set_token("first").unwrap();
        store.set_token("second").unwrap();
    }
    let reopened = QueueStore::open(temp.path()).unwrap();
    assert_eq!(reopened.get_token().as_deref(), Some("second"));
    assert!(reopened.group_ids().is_empty());
}

#[test]
fn concurrent_removals_all_land() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(QueueStore::open(temp.path()).unwrap());
    let urls: Vec<String> = (0..40).map(|i| format!("u{i}")).collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    store.create_group(group_with(&url_refs)).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = store.clone();
            let urls = urls.clone();
            thread::spawn(move || {
                // Every worker removes every url; only one removal per url may report true.
                let mut removed = 0;
                for url in urls.iter().cycle().skip(worker * 10).take(urls.len()) {
                    if store.remove_media_item("42", url).unwrap() {
                        removed += 1;
                    }
                }
                removed
            })
        })
        .collect();
    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(total, 40);
    assert!(store.get_group("42").unwrap().is_drained());
    assert!(QueueStore::open(temp.path())
        .unwrap()
        .get_group("42")
        .unwrap()
        .is_drained());
}

#[test]
fn corrupt_store_is_reported() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(STORE_FILENAME), "not ron at all {").unwrap();

    let err = QueueStore::open(temp.path()).err().expect("parse error");
    assert!(matches!(err, StoreError::Parse { .. }));
}

#[test]
fn state_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let err = QueueStore::open(&file_path).err().expect("state dir error");
    assert!(matches!(err, StoreError::StateDir(_)));
}
