//! Debounced persistence and round-trip fidelity (spec.md §8, scenario 6).

mod common;

use std::time::Duration;

use provider_pool_manager::pool::PoolDocument;
use provider_pool_manager::{Config, PoolStore};

#[tokio::test]
async fn debounced_saves_coalesce_into_one_write() {
    let (uuid, entry) = common::entry_named("X");
    let mut doc = PoolDocument::new();
    doc.insert("openai-custom".to_string(), vec![entry]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("provider_pools.json");
    common::write_doc(&path, &doc);

    let mut config = Config::for_test(path.clone());
    config.save_debounce_time = Duration::from_millis(200);
    let store = PoolStore::load(&config).await;

    let before = std::fs::metadata(&path).unwrap().modified().unwrap();

    for _ in 0..10 {
        store
            .with_entry_mut("openai-custom", uuid, |e| {
                e.usage_count += 1;
            })
            .await;
        store.schedule_save("openai-custom").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // 10 rapid mutations within well under the 200ms debounce window;
    // the file on disk should not have changed yet.
    let mid = std::fs::metadata(&path).unwrap().modified().unwrap();
    assert_eq!(before, mid);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let contents = std::fs::read_to_string(&path).unwrap();
    let written: PoolDocument = serde_json::from_str(&contents).unwrap();
    let entries = &written["openai-custom"];
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].usage_count, 10);
}

#[tokio::test]
async fn round_trip_preserves_unknown_extras() {
    let (_uuid, mut entry) = common::entry_named("X");
    entry
        .extras
        .insert("_comment".to_string(), serde_json::json!("do not delete"));
    entry
        .extras
        .insert("_originalId".to_string(), serde_json::json!("legacy-42"));

    let mut doc = PoolDocument::new();
    doc.insert("claude-custom".to_string(), vec![entry]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("provider_pools.json");
    common::write_doc(&path, &doc);

    let config = Config::for_test(path.clone());
    let store = PoolStore::load(&config).await;
    store.schedule_save("claude-custom").await;
    tokio::time::sleep(Duration::from_millis(1_200)).await;

    let contents = std::fs::read_to_string(&path).unwrap();
    let reloaded: PoolDocument = serde_json::from_str(&contents).unwrap();
    let reloaded_entry = &reloaded["claude-custom"][0];
    assert_eq!(
        reloaded_entry.extras.get("_comment").unwrap().as_str(),
        Some("do not delete")
    );
    assert_eq!(
        reloaded_entry.extras.get("_originalId").unwrap().as_str(),
        Some("legacy-42")
    );
}

#[tokio::test]
async fn missing_pool_file_is_treated_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.json");
    let config = Config::for_test(path);
    let store = PoolStore::load(&config).await;
    assert!(store.entries("openai-custom").await.is_empty());
}

#[tokio::test]
async fn shutdown_flush_now_writes_immediately_without_waiting_for_debounce() {
    let (uuid, entry) = common::entry_named("X");
    let mut doc = PoolDocument::new();
    doc.insert("openai-custom".to_string(), vec![entry]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("provider_pools.json");
    common::write_doc(&path, &doc);

    let mut config = Config::for_test(path.clone());
    config.save_debounce_time = Duration::from_secs(60);
    let store = PoolStore::load(&config).await;

    store
        .with_entry_mut("openai-custom", uuid, |e| e.usage_count = 42)
        .await;
    store.schedule_save("openai-custom").await;
    store.flush_now().await;

    let contents = std::fs::read_to_string(&path).unwrap();
    let written: PoolDocument = serde_json::from_str(&contents).unwrap();
    assert_eq!(written["openai-custom"][0].usage_count, 42);
}
