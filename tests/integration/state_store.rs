//! Integration tests for the SQLite state store.

use std::sync::Arc;
use std::thread;

use cld::error::CldError;
use cld::store::{StateKey, StateStore};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use crate::common::init_test_logging;
use crate::common::fixtures::write_state_db;

#[test]
fn test_set_many_then_get_all() {
    init_test_logging();
    let store = StateStore::in_memory().unwrap();
    let stamp = store
        .set_many(&[
            (StateKey::Pages, json!([{"id": "p1", "layout": "grid"}])),
            (StateKey::PageCount, json!(1)),
        ])
        .unwrap();

    let dump = store.get_all().unwrap();
    assert_eq!(dump.get(StateKey::Pages), Some(&json!([{"id": "p1", "layout": "grid"}])));
    assert_eq!(dump.get(StateKey::PageCount), Some(&json!(1)));
    assert_eq!(dump.watermark, stamp);
    assert_eq!(store.last_modified().unwrap(), stamp);
}

#[test]
fn test_state_survives_reopen() {
    init_test_logging();
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("state.db");

    {
        let store = StateStore::open(&path).unwrap();
        store.set(StateKey::PageCount, &7).unwrap();
    }

    let store = StateStore::open(&path).unwrap();
    assert_eq!(store.get_as::<usize>(StateKey::PageCount).unwrap(), Some(7));
}

#[test]
fn test_every_write_advances_watermark() {
    init_test_logging();
    let store = StateStore::in_memory().unwrap();
    let mut last = store.last_modified().unwrap();
    for n in 0..20 {
        store.set(StateKey::PageCount, &n).unwrap();
        let now = store.last_modified().unwrap();
        assert!(now > last, "watermark did not advance on write {n}");
        last = now;
    }
}

#[test]
fn test_concurrent_updates_are_not_lost() {
    init_test_logging();
    let store = Arc::new(StateStore::in_memory().unwrap());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..25 {
                    store
                        .update(StateKey::Images, |images: &mut Vec<String>| {
                            images.push(format!("{worker}-{n}"));
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let images: Vec<String> = store.get_as(StateKey::Images).unwrap().unwrap();
    assert_eq!(images.len(), 100);
}

#[test]
fn test_import_preserves_source_timestamps() {
    init_test_logging();
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("legacy.db");
    write_state_db(
        &source,
        &[
            ("pages", r#"[{"id":"p1","layout":"grid"}]"#, 1_000),
            ("pageCount", "1", 2_000),
            ("images", "[]", 1_500),
        ],
    );

    let store = StateStore::in_memory().unwrap();
    assert_eq!(store.import_from(&source).unwrap(), 3);

    let entries = store.entries().unwrap();
    let page_count = entries.iter().find(|e| e.key == "pageCount").unwrap();
    assert_eq!(page_count.updated_at, 2_000);
    assert_eq!(page_count.value, json!(1));
    assert_eq!(store.last_modified().unwrap(), 2_000);
}

#[test]
fn test_import_seeds_keys_missing_from_source() {
    init_test_logging();
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("partial.db");
    write_state_db(&source, &[("pageCount", "4", 10)]);

    let store = StateStore::in_memory().unwrap();
    store.set(StateKey::Images, &vec!["stale"]).unwrap();
    store.import_from(&source).unwrap();

    let dump = store.get_all().unwrap();
    assert_eq!(dump.get(StateKey::PageCount), Some(&json!(4)));
    assert_eq!(dump.get(StateKey::Images), Some(&json!([])));
    assert_eq!(dump.get(StateKey::Pages), Some(&json!([])));
}

#[test]
fn test_import_without_state_table_leaves_store_unchanged() {
    init_test_logging();
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("other.db");
    rusqlite::Connection::open(&source)
        .unwrap()
        .execute_batch("CREATE TABLE notes (body TEXT);")
        .unwrap();

    let store = StateStore::in_memory().unwrap();
    store.set(StateKey::PageCount, &3).unwrap();
    let before = store.get_all().unwrap();

    let err = store.import_from(&source).unwrap_err();
    match &err {
        CldError::ImportSource { reason, .. } => {
            assert_eq!(reason, "missing required \"state\" table");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.get_all().unwrap(), before);
}

#[test]
fn test_import_missing_source() {
    init_test_logging();
    let tmp = TempDir::new().unwrap();
    let store = StateStore::in_memory().unwrap();
    let err = store.import_from(&tmp.path().join("nope.db")).unwrap_err();
    assert!(err.to_string().contains("source database not found"));
}
