use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lmnh_core::archive::ArchiveRow;
use lmnh_core::drivers::{run_batch, run_stream, CapMode, RowReport, StreamOptions};
use lmnh_core::loader::Loader;
use lmnh_core::source::{SourceError, StreamSource};
use lmnh_core::store::MemoryStore;
use lmnh_core::types::InteractionKind;
use tokio::sync::watch;

fn archive_row(at: &str, site: &str, val: &str, kind: &str) -> ArchiveRow {
    ArchiveRow {
        at: at.to_string(),
        site: site.to_string(),
        val: val.to_string(),
        kind: Some(kind.to_string()),
    }
}

fn seeded() -> (Arc<MemoryStore>, Loader) {
    let store = Arc::new(MemoryStore::seeded());
    let loader = Loader::new(store.clone());
    (store, loader)
}

/// Replays a fixed script of polls, then reports empty polls forever.
struct ScriptedSource {
    script: VecDeque<Option<&'static str>>,
    polls: usize,
}

impl ScriptedSource {
    fn new(script: impl IntoIterator<Item = Option<&'static str>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            polls: 0,
        }
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    async fn poll(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, SourceError> {
        self.polls += 1;
        Ok(self
            .script
            .pop_front()
            .flatten()
            .map(|payload| payload.as_bytes().to_vec()))
    }
}

fn quick(cap: u64, cap_by: CapMode) -> StreamOptions {
    StreamOptions {
        cap: Some(cap),
        cap_by,
        poll_timeout: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn three_identical_rows_insert_once_and_skip_twice() {
    let (store, loader) = seeded();
    let rows = vec![archive_row("2022-07-01 09:05:41", "3", "2", ""); 3];

    let summary = run_batch(&loader, &rows, None, |_| {}).await.unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.skipped_message(), "2 rows skipped.");
    assert_eq!(store.rows().unwrap().len(), 1);
}

#[tokio::test]
async fn batch_limit_keeps_the_first_rows() {
    let (store, loader) = seeded();
    let rows = vec![
        archive_row("2022-07-01 09:05:41", "0", "1", ""),
        archive_row("2022-07-01 09:05:42", "1", "2", ""),
        archive_row("2022-07-01 09:05:43", "2", "3", ""),
    ];

    let mut seen = 0;
    let summary = run_batch(&loader, &rows, Some(2), |_| seen += 1).await.unwrap();

    assert_eq!(seen, 2);
    assert_eq!(summary.inserted, 2);
    let stored = store.rows().unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].exhibition_id, 2);
}

#[tokio::test]
async fn batch_without_limit_loads_the_last_row_too() {
    let (_store, loader) = seeded();
    let rows = vec![
        archive_row("2022-07-01 09:05:41", "0", "1", ""),
        archive_row("2022-07-01 09:05:42", "1", "2", ""),
    ];

    let summary = run_batch(&loader, &rows, None, |_| {}).await.unwrap();
    assert_eq!(summary.inserted, 2);
}

#[tokio::test]
async fn invalid_archive_rows_are_counted_and_skipped_over() {
    let (store, loader) = seeded();
    let rows = vec![
        archive_row("2022-07-01 09:05:41", "9", "1", ""),
        archive_row("not a date", "1", "2", ""),
        archive_row("2022-07-01 09:05:43", "2", "-1", ""),
        archive_row("2022-07-01 09:05:44", "2", "4", ""),
    ];

    let mut invalid = 0;
    let summary = run_batch(&loader, &rows, None, |report| {
        if matches!(report, RowReport::Invalid(_)) {
            invalid += 1;
        }
    })
    .await
    .unwrap();

    assert_eq!(invalid, 3);
    assert_eq!(summary.invalid, 3);
    assert_eq!(summary.inserted, 1);
    assert_eq!(store.rows().unwrap().len(), 1);
}

#[tokio::test]
async fn float_request_types_from_csv_are_accepted() {
    let (store, loader) = seeded();
    let rows = vec![
        archive_row("2022-07-01 09:05:41", "4", "-1", "0.0"),
        archive_row("2022-07-01 09:05:41", "4", "-1", "1.0"),
    ];

    let summary = run_batch(&loader, &rows, None, |_| {}).await.unwrap();

    assert_eq!(summary.inserted, 2);
    let stored = store.rows().unwrap();
    assert!(stored.iter().all(|key| key.kind == InteractionKind::Request));
    assert_eq!(stored[0].value_id, 1);
    assert_eq!(stored[1].value_id, 2);
}

#[tokio::test]
async fn unresolvable_rows_are_dropped_and_the_batch_continues() {
    let store = Arc::new(MemoryStore::new());
    for public_id in ["EXH_00", "EXH_01", "EXH_02", "EXH_04", "EXH_05"] {
        store.add_exhibition(public_id).unwrap();
    }
    for value in 0..=4 {
        store.add_value(InteractionKind::Rating, value).unwrap();
    }
    let loader = Loader::new(store.clone());
    let rows = vec![
        archive_row("2022-07-01 09:05:41", "3", "2", ""),
        archive_row("2022-07-01 09:05:42", "1", "2", ""),
    ];

    let mut reports = Vec::new();
    let summary = run_batch(&loader, &rows, None, |report| {
        reports.push(matches!(report, RowReport::Unresolved(_)))
    })
    .await
    .unwrap();

    assert_eq!(reports, vec![true, false]);
    assert_eq!(summary.unresolved, 1);
    assert_eq!(summary.inserted, 1);
    assert_eq!(store.rows().unwrap().len(), 1);
}

#[tokio::test]
async fn a_rejected_insert_fails_only_its_row() {
    let (store, loader) = seeded();
    // EXH_03 is the fourth seeded exhibition.
    store.reject_inserts_for(4).unwrap();
    let rows = vec![
        archive_row("2022-07-01 09:05:41", "3", "2", ""),
        archive_row("2022-07-01 09:05:42", "1", "2", ""),
        archive_row("2022-07-01 09:05:43", "2", "-1", "1.0"),
    ];

    let mut failed = 0;
    let summary = run_batch(&loader, &rows, None, |report| {
        if let RowReport::Failed(err) = report {
            assert!(!err.is_connection_loss());
            failed += 1;
        }
    })
    .await
    .unwrap();

    assert_eq!(failed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.inserted, 2);
    assert_eq!(store.rows().unwrap().len(), 2);
}

#[tokio::test]
async fn batch_aborts_when_the_store_goes_away() {
    let (store, loader) = seeded();
    store.set_offline(true).unwrap();
    let rows = vec![archive_row("2022-07-01 09:05:41", "4", "2", "")];

    let err = run_batch(&loader, &rows, None, |_| {}).await.unwrap_err();
    assert!(err.to_string().contains("lost connection"));
}

#[tokio::test]
async fn stream_stops_after_the_configured_number_of_polls() {
    let (store, loader) = seeded();
    let mut source = ScriptedSource::new([
        Some(r#"{"at": "2025-05-14T10:00:00", "site": "1", "val": 2}"#),
        None,
        None,
        Some(r#"{"at": "2025-05-14T10:00:05", "site": "1", "val": 3}"#),
    ]);
    let (_stop_tx, stop_rx) = watch::channel(false);

    let summary = run_stream(&loader, &mut source, &quick(3, CapMode::Iterations), stop_rx)
        .await
        .unwrap();

    assert_eq!(source.polls, 3);
    assert_eq!(summary.polls, 3);
    assert_eq!(summary.messages, 1);
    assert_eq!(store.rows().unwrap().len(), 1);
}

#[tokio::test]
async fn zero_poll_cap_never_polls() {
    let (store, loader) = seeded();
    let mut source = ScriptedSource::new([Some(
        r#"{"at": "2025-05-14T10:00:00", "site": "1", "val": 2}"#,
    )]);
    let (_stop_tx, stop_rx) = watch::channel(false);

    let summary = run_stream(&loader, &mut source, &quick(0, CapMode::Iterations), stop_rx)
        .await
        .unwrap();

    assert_eq!(source.polls, 0);
    assert_eq!(summary.polls, 0);
    assert!(store.rows().unwrap().is_empty());
}

#[tokio::test]
async fn message_cap_ignores_empty_polls() {
    let (_store, loader) = seeded();
    let mut source = ScriptedSource::new([
        None,
        Some(r#"{"at": "2025-05-14T10:00:00", "site": "1", "val": 2}"#),
        None,
        Some(r#"{"at": "2025-05-14T10:00:05", "site": "1", "val": 3}"#),
        Some(r#"{"at": "2025-05-14T10:00:09", "site": "1", "val": 4}"#),
    ]);
    let (_stop_tx, stop_rx) = watch::channel(false);

    let summary = run_stream(&loader, &mut source, &quick(2, CapMode::Messages), stop_rx)
        .await
        .unwrap();

    assert_eq!(summary.polls, 4);
    assert_eq!(summary.messages, 2);
    assert_eq!(summary.load.inserted, 2);
}

#[tokio::test]
async fn invalid_messages_are_logged_and_dropped() {
    let (store, loader) = seeded();
    let mut source = ScriptedSource::new([
        Some("not json"),
        Some(r#"{"site": "1", "val": 2}"#),
        Some(r#"{"at": "2025-05-14T10:00:00", "site": "1", "val": -1, "type": "0"}"#),
        Some(r#"{"at": "2025-05-14T10:00:00", "site": "1", "val": -1, "type": 1}"#),
    ]);
    let (_stop_tx, stop_rx) = watch::channel(false);

    let summary = run_stream(&loader, &mut source, &quick(4, CapMode::Iterations), stop_rx)
        .await
        .unwrap();

    assert_eq!(summary.load.invalid, 3);
    assert_eq!(summary.load.inserted, 1);
    assert_eq!(store.rows().unwrap()[0].kind, InteractionKind::Request);
}

#[tokio::test]
async fn stop_signal_ends_the_stream_before_polling() {
    let (_store, loader) = seeded();
    let mut source = ScriptedSource::new([None]);
    let (stop_tx, stop_rx) = watch::channel(false);
    stop_tx.send(true).unwrap();

    let summary = run_stream(&loader, &mut source, &StreamOptions::default(), stop_rx)
        .await
        .unwrap();

    assert_eq!(summary.polls, 0);
    assert_eq!(source.polls, 0);
}

#[tokio::test]
async fn stream_aborts_on_connection_loss() {
    let (store, loader) = seeded();
    store.set_offline(true).unwrap();
    let mut source = ScriptedSource::new([Some(
        r#"{"at": "2025-05-14T10:00:00", "site": "1", "val": 2}"#,
    )]);
    let (_stop_tx, stop_rx) = watch::channel(false);

    let result = run_stream(&loader, &mut source, &quick(5, CapMode::Iterations), stop_rx).await;
    assert!(result.is_err());
    assert_eq!(source.polls, 1);
}
