//! Integration tests for on-disk persistence

use account_rs::access::{AccessGate, InboundEvent, Outcome};
use account_rs::config::{AccountConfig, StorageConfig, DEFAULT_FAILURE_REPLY};
use account_rs::storage::StoreRegistry;
use chrono::{Local, TimeZone};
use std::sync::Arc;
use tempfile::TempDir;

fn file_config(dir: &TempDir) -> AccountConfig {
    let mut config = AccountConfig::default();
    config.storage = StorageConfig {
        database_path: dir.path().join("accounts.db").to_string_lossy().into_owned(),
        max_connections: 4,
    };
    config.quota.daily_free_limit = 5;
    config
}

#[tokio::test]
async fn test_quota_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);
    let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let event = InboundEvent::direct("wxid_restart");

    {
        let registry = StoreRegistry::new();
        let store = registry.open(&config.storage).await.unwrap();
        let gate = AccessGate::new(store, &config);
        gate.evaluate_event(&event, now).await.unwrap();
        gate.evaluate_event(&event, now).await.unwrap();
        registry.close_all().await;
    }

    let registry = StoreRegistry::new();
    let store = registry.open(&config.storage).await.unwrap();
    let record = store.find_by_identity("wxid_restart").await.unwrap().unwrap();
    assert_eq!(record.free_quota_remaining, 3);
    assert_eq!(record.created_at, now);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_shared_identities_all_succeed() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);
    let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let registry = StoreRegistry::new();
    let store = registry.open(&config.storage).await.unwrap();
    let gate = Arc::new(AccessGate::new(store.clone(), &config));

    // 4 identities, 5 requests each, exactly the daily limit
    let mut handles = Vec::new();
    for i in 0..20 {
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            let event = InboundEvent::direct(format!("wxid_{}", i % 4));
            gate.handle_at(&event, now).await
        }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert_ne!(outcome.reply.as_deref(), Some(DEFAULT_FAILURE_REPLY));
        assert_eq!(outcome, Outcome::proceed());
    }

    for i in 0..4 {
        let record = store
            .find_by_identity(&format!("wxid_{}", i))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.free_quota_remaining, 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fresh_identities_all_get_free_use() {
    let dir = TempDir::new().unwrap();
    let mut config = file_config(&dir);
    config.storage.max_connections = 5;
    config.quota.daily_free_limit = 30;
    let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let registry = StoreRegistry::new();
    let store = registry.open(&config.storage).await.unwrap();
    let gate = Arc::new(AccessGate::new(store.clone(), &config));

    let mut handles = Vec::new();
    for i in 0..40 {
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            let event = InboundEvent::direct(format!("user_{}", i));
            gate.handle_at(&event, now).await
        }));
    }

    let mut failures = 0;
    let mut allowed = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        if outcome.reply.as_deref() == Some(DEFAULT_FAILURE_REPLY) {
            failures += 1;
        }
        if outcome == Outcome::proceed() {
            allowed += 1;
        }
    }
    assert_eq!(failures, 0);
    assert_eq!(allowed, 40);

    assert_eq!(store.count().await.unwrap(), 40);
    for record in store.list_all().await.unwrap() {
        assert_eq!(record.free_quota_remaining, 29);
    }
}
