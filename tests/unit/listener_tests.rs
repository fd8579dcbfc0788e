//! Listener Tests
//!
//! Tests the inbound side:
//! - Reconnect state machine driven by a scripted source
//! - Registration of addresses from the source chat only

use crate::common::*;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wallet_sentinel::listener::{
    run_listener, BackoffPolicy, ConnectionState, InboundMessage, ListenerError,
    RegistrationHandler,
};
use wallet_sentinel::metrics::SentinelMetrics;
use wallet_sentinel::store::{MemoryBackend, WalletStore};

const SOURCE_CHAT: i64 = -1001;

fn fast_policy(max_attempts: u32) -> BackoffPolicy {
    BackoffPolicy {
        initial: Duration::from_millis(1),
        max: Duration::from_millis(4),
        max_attempts,
    }
}

fn message(chat_id: i64, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id,
        text: text.to_string(),
    }
}

fn api_error() -> ListenerError {
    ListenerError::Api {
        status: 502,
        description: "Bad Gateway".to_string(),
    }
}

#[tokio::test]
async fn test_listener_forwards_batches() {
    let source = ScriptedSource::new(vec![
        Ok(vec![message(SOURCE_CHAT, "first")]),
        Ok(vec![]),
        Ok(vec![message(SOURCE_CHAT, "second")]),
    ]);
    let (tx, mut rx) = mpsc::channel(8);
    let state = Arc::new(RwLock::new(ConnectionState::Connected));
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_listener(source, tx, fast_policy(3), state.clone(), cancel.clone()));

    assert_eq!(rx.recv().await.unwrap().text, "first");
    assert_eq!(rx.recv().await.unwrap().text, "second");
    assert_eq!(*state.read(), ConnectionState::Connected);

    cancel.cancel();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_listener_recovers_after_failures() {
    let source = ScriptedSource::new(vec![
        Err(api_error()),
        Err(ListenerError::Conflict("terminated by other getUpdates request".to_string())),
        Ok(vec![message(SOURCE_CHAT, "back")]),
    ]);
    let (tx, mut rx) = mpsc::channel(8);
    let state = Arc::new(RwLock::new(ConnectionState::Connected));
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_listener(source, tx, fast_policy(3), state.clone(), cancel.clone()));

    assert_eq!(rx.recv().await.unwrap().text, "back");
    assert_eq!(*state.read(), ConnectionState::Connected);

    cancel.cancel();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_listener_gives_up_after_budget() {
    let source = ScriptedSource::new(vec![Err(api_error()), Err(api_error()), Err(api_error())]);
    let (tx, _rx) = mpsc::channel(8);
    let state = Arc::new(RwLock::new(ConnectionState::Connected));

    let result = run_listener(source, tx, fast_policy(2), state.clone(), CancellationToken::new()).await;

    assert!(matches!(result, Err(ListenerError::GaveUp { attempts: 2 })));
    assert_eq!(*state.read(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_listener_stops_on_cancel() {
    let source = ScriptedSource::new(vec![]);
    let (tx, _rx) = mpsc::channel(8);
    let state = Arc::new(RwLock::new(ConnectionState::Connected));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        run_listener(source, tx, fast_policy(2), state, cancel),
    )
    .await
    .unwrap();
    assert!(result.is_ok());
}

async fn handler() -> (RegistrationHandler, Arc<WalletStore>, Arc<SentinelMetrics>) {
    let store = Arc::new(WalletStore::open(Arc::new(MemoryBackend::new())).await.unwrap());
    let metrics = Arc::new(SentinelMetrics::new().unwrap());
    let handler = RegistrationHandler::new(store.clone(), SOURCE_CHAT, metrics.clone());
    (handler, store, metrics)
}

#[tokio::test]
async fn test_registration_from_source_chat() {
    let (handler, store, metrics) = handler().await;

    let outcome = handler
        .handle(&message(SOURCE_CHAT, &format!("watch {} please", WALLET_A)))
        .await
        .unwrap();

    assert!(outcome.unwrap().inserted);
    assert!(store.get(&addr(WALLET_A)).await.unwrap().last_tx.is_empty());
    assert_eq!(metrics.registrations.get(), 1);
    assert_eq!(metrics.tracked_wallets.get(), 1);
}

#[tokio::test]
async fn test_registration_is_idempotent_across_case() {
    let (handler, store, metrics) = handler().await;
    let upper = "0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD";

    handler.handle(&message(SOURCE_CHAT, upper)).await.unwrap();
    let second = handler
        .handle(&message(SOURCE_CHAT, &upper.to_lowercase()))
        .await
        .unwrap();

    assert!(!second.unwrap().inserted);
    assert_eq!(store.len().await, 1);
    assert_eq!(metrics.registrations.get(), 1);
}

#[tokio::test]
async fn test_registration_ignores_other_chats_and_plain_text() {
    let (handler, store, _) = handler().await;

    assert!(handler.handle(&message(-999, WALLET_A)).await.unwrap().is_none());
    assert!(handler.handle(&message(SOURCE_CHAT, "gm")).await.unwrap().is_none());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_registration_task_drains_channel() {
    let (handler, store, _) = handler().await;
    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(handler.run(rx, cancel));

    tx.send(message(SOURCE_CHAT, WALLET_A)).await.unwrap();
    tx.send(message(SOURCE_CHAT, WALLET_B)).await.unwrap();
    drop(tx);
    task.await.unwrap();

    assert_eq!(store.len().await, 2);
}
