//! Wallet Store Integration Tests
//!
//! Tests durable backends against real files:
//! - SQLite round trip across reopen
//! - JSON file round trip and legacy bare-address entries
//! - Registration racing a cycle commit on the JSON file
//! - Backend selection from configuration

use std::sync::Arc;
use tempfile::TempDir;

use crate::common::*;
use wallet_sentinel::config::{StorageBackend, StorageConfig};
use wallet_sentinel::engine::{CycleOutcome, Engine};
use wallet_sentinel::metrics::SentinelMetrics;
use wallet_sentinel::models::TxCounts;
use wallet_sentinel::store::{JsonFileBackend, SqliteBackend, StoreError, WalletStore};

fn sqlite_config(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        backend: StorageBackend::Sqlite,
        path: dir.path().join("nested").join("wallets.db"),
        max_connections: 2,
    }
}

#[tokio::test]
async fn test_sqlite_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = sqlite_config(&dir);

    {
        let store = WalletStore::from_config(&config).await.unwrap();
        assert_eq!(store.backend_name(), "sqlite");
        store.add_if_absent(&addr(WALLET_A)).await.unwrap();
        store.add_if_absent(&addr(WALLET_B)).await.unwrap();
        store
            .commit(
                &addr(WALLET_A),
                TxCounts::from([("Eth".to_string(), 12), ("Base".to_string(), 3)]),
            )
            .await
            .unwrap();
    }

    let store = WalletStore::from_config(&config).await.unwrap();
    let wallets = store.list_all().await;
    assert_eq!(wallets.len(), 2);
    assert_eq!(wallets[0].address, addr(WALLET_A));
    assert_eq!(wallets[0].last_known("Eth"), 12);
    assert_eq!(wallets[0].last_known("Base"), 3);
    assert!(wallets[1].last_tx.is_empty());
}

#[tokio::test]
async fn test_sqlite_duplicate_insert_is_noop() {
    let dir = TempDir::new().unwrap();
    let store = WalletStore::from_config(&sqlite_config(&dir)).await.unwrap();

    assert!(store.add_if_absent(&addr(WALLET_A)).await.unwrap().inserted);
    assert!(!store.add_if_absent(&addr(WALLET_A)).await.unwrap().inserted);

    let backend = SqliteBackend::open(&sqlite_config(&dir)).await.unwrap();
    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wallets")
        .fetch_one(backend.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_sqlite_update_of_missing_row() {
    use wallet_sentinel::models::Wallet;
    use wallet_sentinel::store::WalletBackend;

    let dir = TempDir::new().unwrap();
    let backend = SqliteBackend::open(&sqlite_config(&dir)).await.unwrap();

    let result = backend.update(&Wallet::new(addr(WALLET_A)), &[]).await;
    assert!(matches!(result, Err(StoreError::UnknownWallet(_))));
}

#[tokio::test]
async fn test_json_round_trip_uses_flat_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallets.json");

    {
        let store = WalletStore::open(Arc::new(JsonFileBackend::new(&path)))
            .await
            .unwrap();
        store.add_if_absent(&addr(WALLET_A)).await.unwrap();
        store
            .commit(&addr(WALLET_A), TxCounts::from([("Eth".to_string(), 7)]))
            .await
            .unwrap();
    }

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw[0]["address"], WALLET_A);
    assert_eq!(raw[0]["lastTx"]["Eth"], 7);

    let store = WalletStore::open(Arc::new(JsonFileBackend::new(&path)))
        .await
        .unwrap();
    assert_eq!(store.get(&addr(WALLET_A)).await.unwrap().last_known("Eth"), 7);
}

#[tokio::test]
async fn test_json_accepts_bare_addresses() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallets.json");
    std::fs::write(
        &path,
        format!(
            r#"["{}", {{"address": "{}", "lastTx": {{"Eth": 2}}}}]"#,
            WALLET_A, WALLET_B
        ),
    )
    .unwrap();

    let store = WalletStore::open(Arc::new(JsonFileBackend::new(&path)))
        .await
        .unwrap();

    let wallets = store.list_all().await;
    assert_eq!(wallets.len(), 2);
    assert_eq!(wallets[0].address, addr(WALLET_A));
    assert!(wallets[0].last_tx.is_empty());
    assert_eq!(wallets[1].last_known("Eth"), 2);
}

#[tokio::test]
async fn test_json_backend_from_config() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig {
        backend: StorageBackend::Json,
        path: dir.path().join("wallets.json"),
        max_connections: 1,
    };

    let store = WalletStore::from_config(&config).await.unwrap();
    assert_eq!(store.backend_name(), "json");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_json_registration_during_cycle_keeps_both_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallets.json");

    let store = Arc::new(
        WalletStore::open(Arc::new(JsonFileBackend::new(&path)))
            .await
            .unwrap(),
    );
    store.add_if_absent(&addr(WALLET_A)).await.unwrap();

    let fetcher = Arc::new(GatedFetcher::default());
    let engine = Arc::new(Engine::new(
        store.clone(),
        Arc::new(registry(&["X"])),
        fetcher.clone(),
        Arc::new(RecordingNotifier::new()),
        Arc::new(SentinelMetrics::new().unwrap()),
        test_engine_config(),
    ));

    let cycle = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run_cycle().await }
    });
    fetcher.entered.notified().await;

    // Register while the cycle is mid-fetch, releasing it at the same time
    let wallet_b = addr(WALLET_B);
    let (added, ()) = tokio::join!(store.add_if_absent(&wallet_b), async {
        fetcher.release.notify_one();
    });
    assert!(added.unwrap().inserted);

    match cycle.await.unwrap() {
        CycleOutcome::Completed(report) => assert_eq!(report.commits, 1),
        CycleOutcome::Skipped => panic!("cycle unexpectedly skipped"),
    }

    drop(engine);
    drop(store);

    let reopened = WalletStore::open(Arc::new(JsonFileBackend::new(&path)))
        .await
        .unwrap();
    assert_eq!(reopened.len().await, 2);
    assert_eq!(reopened.get(&addr(WALLET_A)).await.unwrap().last_known("X"), 1);
    assert!(reopened.get(&addr(WALLET_B)).await.unwrap().last_tx.is_empty());
}
