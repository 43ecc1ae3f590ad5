//! Integration tests for snapshot export and import.

use cld::archive::SnapshotArchiver;
use cld::error::CldError;
use pretty_assertions::assert_eq;

use crate::common::init_test_logging;
use crate::common::fixtures::{TestWorkspace, sample_pages, write_state_db, write_zip};

#[test]
fn test_export_import_across_data_dirs() {
    init_test_logging();
    let source = TestWorkspace::new();
    source.save_uploaded_asset("cat.png", b"meow").unwrap();
    source.save_uploaded_asset("dog.png", b"woof").unwrap();
    source.set_pages(&sample_pages()).unwrap();
    let expected = source.snapshot().unwrap();

    let exported = SnapshotArchiver::new(&source)
        .with_export_dir(source.scratch())
        .export()
        .unwrap();

    let target = TestWorkspace::new();
    target.save_uploaded_asset("old.png", b"old").unwrap();
    SnapshotArchiver::new(&target).import(&exported.path).unwrap();

    let restored = target.snapshot().unwrap();
    assert_eq!(restored.images, expected.images);
    assert_eq!(restored.pages, expected.pages);
    assert_eq!(restored.page_count, expected.page_count);
    assert_eq!(restored.watermark, expected.watermark);
    assert_eq!(std::fs::read(target.uploads_dir().join("cat.png")).unwrap(), b"meow");
    assert!(!target.uploads_dir().join("old.png").exists());
}

#[test]
fn test_import_wrapped_archive_with_odd_case() {
    init_test_logging();
    let source = TestWorkspace::new();
    source.set_pages(&sample_pages()).unwrap();
    let db = source.scratch().join("state.db");
    std::fs::copy(source.data_paths().state_db(), &db).unwrap();
    let db_bytes = std::fs::read(&db).unwrap();

    let archive = source.scratch().join("wrapped.zip");
    write_zip(
        &archive,
        &[
            ("backup/State.DB", &db_bytes[..]),
            ("backup/UPLOADS/panel.png", &b"panel"[..]),
        ],
    );

    let target = TestWorkspace::new();
    let summary = SnapshotArchiver::new(&target).import(&archive).unwrap();
    assert!(summary.state_rows.is_some());
    assert_eq!(summary.assets, Some(1));
    assert_eq!(target.pages().unwrap(), sample_pages());
    assert!(target.uploads_dir().join("panel.png").exists());
}

#[test]
fn test_malformed_archive_changes_nothing() {
    init_test_logging();
    let ws = TestWorkspace::new();
    ws.save_uploaded_asset("keep.png", b"k").unwrap();
    ws.set_pages(&sample_pages()).unwrap();
    let before = ws.snapshot().unwrap();

    let bogus = ws.scratch().join("bogus.zip");
    std::fs::write(&bogus, b"PK but not really").unwrap();

    let err = SnapshotArchiver::new(&ws).import(&bogus).unwrap_err();
    assert!(err.is_validation(), "unexpected error: {err:?}");
    assert_eq!(ws.snapshot().unwrap(), before);
    assert!(ws.uploads_dir().join("keep.png").exists());
}

#[test]
fn test_archive_db_without_state_table_keeps_assets() {
    init_test_logging();
    let ws = TestWorkspace::new();
    ws.save_uploaded_asset("keep.png", b"k").unwrap();
    let before = ws.snapshot().unwrap();

    let db = ws.scratch().join("state.db");
    rusqlite::Connection::open(&db)
        .unwrap()
        .execute_batch("CREATE TABLE something_else (x INTEGER);")
        .unwrap();
    let archive = ws.scratch().join("bad-db.zip");
    write_zip(
        &archive,
        &[
            ("state.db", &std::fs::read(&db).unwrap()[..]),
            ("uploads/new.png", &b"n"[..]),
        ],
    );

    let err = SnapshotArchiver::new(&ws).import(&archive).unwrap_err();
    assert!(matches!(err, CldError::ImportSource { .. }));
    assert_eq!(ws.snapshot().unwrap(), before);
    assert!(ws.uploads_dir().join("keep.png").exists());
    assert!(!ws.uploads_dir().join("new.png").exists());
}

#[test]
fn test_import_legacy_state_db() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let db = ws.scratch().join("state.db");
    write_state_db(
        &db,
        &[
            ("images", r#"[{"id":"abc","filename":"x.png","url":"/uploads/x.png"}]"#, 5),
            ("pages", "[]", 5),
            ("pageCount", "0", 5),
        ],
    );
    let archive = ws.scratch().join("legacy.zip");
    let db_bytes = std::fs::read(&db).unwrap();
    write_zip(&archive, &[("state.db", &db_bytes[..])]);

    let summary = SnapshotArchiver::new(&ws).import(&archive).unwrap();
    assert_eq!(summary.state_rows, Some(3));
    assert_eq!(summary.assets, None);
    assert_eq!(ws.images().unwrap()[0].id, "abc");
    assert_eq!(ws.last_modified().unwrap(), 5);
}
