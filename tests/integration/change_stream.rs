//! Change stream tests driven by real workspace writes.

use std::time::{Duration, Instant};

use cld::stream::{StreamConfig, StreamEnd, StreamEvent, stream_changes};
use cld::workspace::Page;
use tokio::sync::mpsc;

use crate::common::init_test_logging;
use crate::common::fixtures::{TestWorkspace, sample_pages};

fn quick(max_ticks: u32) -> StreamConfig {
    StreamConfig {
        poll_interval: Duration::from_millis(20),
        max_duration: Duration::from_secs(5),
        max_ticks,
        retry: Duration::from_millis(5000),
    }
}

async fn next_pages(rx: &mut mpsc::Receiver<StreamEvent>) -> (bool, Vec<Page>, usize) {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("Timed out waiting for stream event")
            .expect("Stream closed early");
        if let StreamEvent::Pages { initial, payload } = event {
            return (initial, payload.pages, payload.page_count);
        }
    }
}

#[tokio::test]
async fn test_write_after_connect_is_pushed() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let (tx, mut rx) = mpsc::channel(16);
    let handle = tokio::spawn(stream_changes(ws.shared(), tx, quick(1000)));

    let (initial, pages, count) = next_pages(&mut rx).await;
    assert!(initial);
    assert!(pages.is_empty());
    assert_eq!(count, 0);

    let writer = ws.shared();
    tokio::task::spawn_blocking(move || writer.set_pages(&sample_pages()))
        .await
        .unwrap()
        .unwrap();

    let (initial, pages, count) = next_pages(&mut rx).await;
    assert!(!initial);
    assert_eq!(pages, sample_pages());
    assert_eq!(count, 2);

    drop(rx);
    assert_eq!(handle.await.unwrap(), StreamEnd::Cancelled);
}

#[tokio::test]
async fn test_write_from_another_handle_is_seen() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let other = ws.reopen();
    let (tx, mut rx) = mpsc::channel(16);
    let handle = tokio::spawn(stream_changes(ws.shared(), tx, quick(1000)));
    next_pages(&mut rx).await;

    tokio::task::spawn_blocking(move || other.save_uploaded_asset("cat.png", b"meow"))
        .await
        .unwrap()
        .unwrap();

    let event = loop {
        match rx.recv().await {
            Some(StreamEvent::Pages { payload, .. }) => break payload,
            Some(_) => {}
            None => panic!("stream closed before the upload was seen"),
        }
    };
    assert_eq!(event.images.len(), 1);
    assert_eq!(event.images[0].url, "/uploads/cat.png");

    drop(rx);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_idle_stream_exhausts_tick_budget() {
    init_test_logging();
    let ws = TestWorkspace::new();
    let (tx, mut rx) = mpsc::channel(16);
    let started = Instant::now();
    let handle = tokio::spawn(stream_changes(ws.shared(), tx, quick(4)));

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(handle.await.unwrap(), StreamEnd::TickBudget);
    assert!(started.elapsed() >= Duration::from_millis(80));
    assert_eq!(events.first(), Some(&StreamEvent::Retry(Duration::from_millis(5000))));
    assert_eq!(events.last(), Some(&StreamEvent::Keepalive));
    let pushes = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Pages { .. }))
        .count();
    assert_eq!(pushes, 1);
}
