use std::sync::Arc;

use lmnh_core::error::{LoadError, ResolutionError};
use lmnh_core::loader::{LoadOutcome, Loader};
use lmnh_core::normalize::normalize;
use lmnh_core::store::MemoryStore;
use lmnh_core::types::{InteractionKind, RawRecord, RequestKind};
use lmnh_core::validation::validate;
use serde_json::json;

fn row(payload: serde_json::Value) -> lmnh_core::types::NormalizedRow {
    let raw = RawRecord::from_json(payload.to_string().as_bytes()).expect("payload decodes");
    normalize(&validate(&raw).expect("payload validates"))
}

fn seeded() -> (Arc<MemoryStore>, Loader) {
    let store = Arc::new(MemoryStore::seeded());
    let loader = Loader::new(store.clone());
    (store, loader)
}

#[tokio::test]
async fn offset_timestamp_rating_lands_in_rating_interaction() {
    let (store, loader) = seeded();
    let row = row(json!({"at": "2025-05-14T12:33:35+01:00", "site": "5", "val": 3}));

    assert_eq!(row.event_at_string(), "2025-05-14 12:33:35");
    assert_eq!(row.site.public_id(), "EXH_05");

    let outcome = loader.load(&row).await.expect("load succeeds");
    assert_eq!(outcome, LoadOutcome::Inserted);

    let rows = store.rows().expect("store readable");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, InteractionKind::Rating);
    // EXH_05 is the sixth seeded exhibition, rating 3 the fourth rating.
    assert_eq!(rows[0].exhibition_id, 6);
    assert_eq!(rows[0].value_id, 4);
}

#[tokio::test]
async fn loading_the_same_row_twice_stores_it_once() {
    let (store, loader) = seeded();
    let row = row(json!({"at": "2025-05-14T09:00:00", "site": "1", "val": 0}));

    assert!(!loader.is_duplicate(&row).await.unwrap());
    assert_eq!(loader.load(&row).await.unwrap(), LoadOutcome::Inserted);
    assert!(loader.is_duplicate(&row).await.unwrap());
    assert_eq!(loader.load(&row).await.unwrap(), LoadOutcome::Skipped);

    assert_eq!(store.rows().unwrap().len(), 1);
}

#[tokio::test]
async fn assistance_request_resolves_its_subtype() {
    let (store, loader) = seeded();
    let row = row(json!({"at": "2025-05-14T10:15:00", "site": "0", "val": -1, "type": 0}));
    assert_eq!(row.subtype(), Some(RequestKind::Assistance));

    assert_eq!(loader.load(&row).await.unwrap(), LoadOutcome::Inserted);

    let rows = store.rows().unwrap();
    assert_eq!(rows[0].kind, InteractionKind::Request);
    assert_eq!(rows[0].exhibition_id, 1);
    assert_eq!(rows[0].value_id, 1);
}

#[tokio::test]
async fn ratings_and_requests_do_not_collide() {
    let (store, loader) = seeded();
    let rating = row(json!({"at": "2025-05-14T10:15:00", "site": "2", "val": 0}));
    let request = row(json!({"at": "2025-05-14T10:15:00", "site": "2", "val": -1, "type": 0}));

    assert_eq!(loader.load(&rating).await.unwrap(), LoadOutcome::Inserted);
    assert_eq!(loader.load(&request).await.unwrap(), LoadOutcome::Inserted);
    assert_eq!(store.rows().unwrap().len(), 2);
}

#[tokio::test]
async fn missing_exhibition_is_unresolved_and_nothing_is_written() {
    let store = Arc::new(MemoryStore::new());
    store.add_value(InteractionKind::Rating, 4).unwrap();
    let loader = Loader::new(store.clone());

    let row = row(json!({"at": "2025-05-14T10:15:00", "site": "3", "val": 4}));
    let err = loader.load(&row).await.unwrap_err();

    match err {
        LoadError::Resolution(ResolutionError::Exhibition { public_id }) => {
            assert_eq!(public_id, "EXH_03");
        }
        other => panic!("expected exhibition resolution error, got {other:?}"),
    }
    assert!(store.rows().unwrap().is_empty());
}

#[tokio::test]
async fn missing_value_row_is_unresolved() {
    let store = Arc::new(MemoryStore::new());
    store.add_exhibition("EXH_03").unwrap();
    let loader = Loader::new(store.clone());

    let row = row(json!({"at": "2025-05-14T10:15:00", "site": "3", "val": -1, "type": 1}));
    let err = loader.load(&row).await.unwrap_err();

    assert!(matches!(
        err,
        LoadError::Resolution(ResolutionError::Value {
            kind: InteractionKind::Request,
            value: 1
        })
    ));
}

#[tokio::test]
async fn offline_store_surfaces_a_connection_loss() {
    let (store, loader) = seeded();
    store.set_offline(true).unwrap();

    let row = row(json!({"at": "2025-05-14T10:15:00", "site": "3", "val": 2}));
    match loader.load(&row).await.unwrap_err() {
        LoadError::Storage(err) => assert!(err.is_connection_loss()),
        other => panic!("expected storage error, got {other:?}"),
    }
}
