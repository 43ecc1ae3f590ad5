//! Integration tests for the workspace facade.

use cld::error::CldError;
use cld::store::StateKey;
use cld::workspace::Page;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::init_test_logging;
use crate::common::fixtures::{TestWorkspace, sample_pages};

#[test]
fn test_upload_then_delete_example() {
    init_test_logging();
    let ws = TestWorkspace::new();

    let item = ws.save_uploaded_asset("cat.png", b"\x89PNG fake").unwrap();
    assert_eq!(item.filename, "cat.png");
    assert_eq!(item.url, "/uploads/cat.png");
    assert!(!item.id.is_empty());
    assert!(ws.images().unwrap().contains(&item));

    assert!(ws.delete_image(&item.id).unwrap());
    assert!(!ws.images().unwrap().contains(&item));
    assert!(!ws.uploads_dir().join("cat.png").exists());
}

#[test]
fn test_delete_keeps_order_of_others() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let a = ws.save_uploaded_asset("a.png", b"a").unwrap();
    let b = ws.save_uploaded_asset("b.png", b"b").unwrap();
    let c = ws.save_uploaded_asset("c.png", b"c").unwrap();

    ws.delete_image(&b.id).unwrap();
    assert_eq!(ws.images().unwrap(), vec![a.clone(), c.clone()]);

    assert!(!ws.delete_image("does-not-exist").unwrap());
    assert_eq!(ws.images().unwrap(), vec![a, c]);
}

#[test]
fn test_pages_round_trip_verbatim() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let sent = json!([
        {
            "layout": "two-horizontal-angled",
            "gutterColor": "#000000",
            "slots": {"1": "a.png"},
            "transforms": {},
            "locked": false
        },
        {"id": "p2", "layout": "x", "slots": null}
    ]);
    let pages: Vec<Page> = serde_json::from_value(sent.clone()).unwrap();

    ws.set_pages(&pages).unwrap();
    assert_eq!(ws.page_count().unwrap(), 2);

    let reopened = ws.reopen();
    assert_eq!(serde_json::to_value(reopened.pages().unwrap()).unwrap(), sent);
    let stored = ws.store().get(StateKey::Pages).unwrap().unwrap();
    assert_eq!(stored, sent);
}

#[test]
fn test_sample_pages_keep_extra_fields() {
    init_test_logging();
    let ws = TestWorkspace::new();
    ws.set_pages(&sample_pages()).unwrap();
    let stored = serde_json::to_value(ws.pages().unwrap()).unwrap();
    assert_eq!(stored[1]["notes"], json!("splash page"));
    assert_eq!(stored[0]["transforms"]["1"]["scale"], json!(1.5));
}

#[test]
fn test_writes_are_visible_to_other_handles() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let other = ws.reopen();

    ws.set_pages(&sample_pages()).unwrap();
    assert_eq!(other.page_count().unwrap(), 2);
    assert_eq!(other.last_modified().unwrap(), ws.last_modified().unwrap());
}

#[test]
fn test_reset_clears_state_and_assets() {
    init_test_logging();
    let ws = TestWorkspace::new();
    ws.save_uploaded_asset("a.png", b"a").unwrap();
    ws.set_pages(&sample_pages()).unwrap();
    let before = ws.last_modified().unwrap();

    ws.reset().unwrap();

    let snapshot = ws.snapshot().unwrap();
    assert!(snapshot.images.is_empty());
    assert!(snapshot.pages.is_empty());
    assert_eq!(snapshot.page_count, 0);
    assert!(snapshot.watermark > before);
    assert!(!ws.uploads_dir().join("a.png").exists());
}

#[test]
fn test_render_bundled_layout() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let html = ws
        .render_layout(
            "two-horizontal-angled",
            &json!({"panel1Clip": "p1", "panel2Clip": "p2"}),
        )
        .unwrap();
    assert!(html.contains(r#"clip-path="url(#p1)""#));
    assert!(html.contains(r#"<clipPath id="p2">"#));
    assert!(!html.contains("<?"));

    assert!(matches!(
        ws.render_layout("missing", &json!({})),
        Err(CldError::LayoutNotFound { .. })
    ));
}
