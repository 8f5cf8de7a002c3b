//! Selector behavior: round-robin, model filtering, error escalation
//! (spec.md §8 literal scenarios 1-3).

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use provider_pool_manager::adapter::{AdapterFactory, ProviderAdapter};
use provider_pool_manager::pool::PoolDocument;
use provider_pool_manager::selector::SelectOptions;
use provider_pool_manager::{Config, PoolStore, ProbeEngine, Selector};
use uuid::Uuid;

struct NoopAdapterFactory;

#[async_trait]
impl AdapterFactory for NoopAdapterFactory {
    async fn adapter_for(
        &self,
        _family: &str,
        _uuid: Uuid,
        _credentials: &serde_json::Value,
    ) -> Option<Arc<dyn ProviderAdapter>> {
        None
    }
    async fn invalidate(&self, _family: &str, _uuid: Uuid) {}
}

async fn make_selector(doc: PoolDocument) -> (Selector, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("provider_pools.json");
    common::write_doc(&path, &doc);

    let config = Config::for_test(path);
    let store = PoolStore::load(&config).await;
    let probe_engine = ProbeEngine::new(store.clone(), Arc::new(NoopAdapterFactory));
    let selector = Selector::new(store, config, probe_engine);
    (selector, dir)
}

#[tokio::test]
async fn round_robin_across_two_healthy_entries() {
    let (uuid_a, entry_a) = common::entry_named("A");
    let (uuid_b, entry_b) = common::entry_named("B");
    let mut doc = PoolDocument::new();
    doc.insert("openai-custom".to_string(), vec![entry_a, entry_b]);

    let (selector, _dir) = make_selector(doc).await;

    let mut order = Vec::new();
    for _ in 0..5 {
        let sel = selector
            .select("openai-custom", None, SelectOptions::default())
            .await
            .expect("selection");
        order.push(sel.entry.uuid);
    }

    assert_eq!(order, vec![uuid_a, uuid_b, uuid_a, uuid_b, uuid_a]);

    let entries = selector_entries(&selector, "openai-custom").await;
    let count = |id: Uuid| entries.iter().find(|e| e.uuid == id).unwrap().usage_count;
    assert_eq!(count(uuid_a), 3);
    assert_eq!(count(uuid_b), 2);
}

#[tokio::test]
async fn model_filtering_excludes_unsupported_entries() {
    let (uuid_a, mut entry_a) = common::entry_named("A");
    entry_a.not_supported_models.insert("gpt-4o".to_string());
    let (uuid_b, entry_b) = common::entry_named("B");

    let mut doc = PoolDocument::new();
    doc.insert("openai-custom".to_string(), vec![entry_a, entry_b]);
    let (selector, _dir) = make_selector(doc).await;

    for _ in 0..3 {
        let sel = selector
            .select("openai-custom", Some("gpt-4o"), SelectOptions::default())
            .await
            .expect("selection");
        assert_eq!(sel.entry.uuid, uuid_b);
    }

    let mut order = Vec::new();
    for _ in 0..2 {
        let sel = selector
            .select("openai-custom", None, SelectOptions::default())
            .await
            .expect("selection");
        order.push(sel.entry.uuid);
    }
    assert_eq!(order, vec![uuid_a, uuid_b]);
}

#[tokio::test]
async fn error_escalation_flips_unhealthy_then_serves_as_fallback() {
    let (uuid_x, entry_x) = common::entry_named("X");
    let mut doc = PoolDocument::new();
    doc.insert("claude-custom".to_string(), vec![entry_x]);
    let (selector, _dir) = make_selector(doc).await;

    let store = selector_store(&selector);
    for _ in 0..3 {
        store
            .mark_unhealthy("claude-custom", uuid_x, Some("timeout".to_string()), 3)
            .await;
    }

    let entries = store.entries("claude-custom").await;
    assert!(!entries[0].is_healthy);

    let sel = selector
        .select("claude-custom", None, SelectOptions::default())
        .await
        .expect("fallback selection");
    assert_eq!(sel.entry.uuid, uuid_x);
    assert!(sel.is_fallback);
}

#[tokio::test]
async fn disabled_entries_are_never_selected() {
    let (uuid_a, mut entry_a) = common::entry_named("A");
    entry_a.is_disabled = true;
    let (uuid_b, entry_b) = common::entry_named("B");

    let mut doc = PoolDocument::new();
    doc.insert("openai-custom".to_string(), vec![entry_a, entry_b]);
    let (selector, _dir) = make_selector(doc).await;

    for _ in 0..4 {
        let sel = selector
            .select("openai-custom", None, SelectOptions::default())
            .await
            .expect("selection");
        assert_eq!(sel.entry.uuid, uuid_b);
        assert_ne!(sel.entry.uuid, uuid_a);
    }
}

#[tokio::test]
async fn empty_family_returns_none() {
    let doc = PoolDocument::new();
    let (selector, _dir) = make_selector(doc).await;
    assert!(selector
        .select("openai-custom", None, SelectOptions::default())
        .await
        .is_none());
}

#[tokio::test]
async fn all_entries_unsupporting_model_returns_none() {
    let (_uuid_a, mut entry_a) = common::entry_named("A");
    entry_a.not_supported_models.insert("gpt-4o".to_string());
    let mut doc = PoolDocument::new();
    doc.insert("openai-custom".to_string(), vec![entry_a]);
    let (selector, _dir) = make_selector(doc).await;

    assert!(selector
        .select("openai-custom", Some("gpt-4o"), SelectOptions::default())
        .await
        .is_none());
}

// Test-only accessors; these exist purely to observe internal state from
// black-box integration tests.
async fn selector_entries(
    selector: &Selector,
    family: &str,
) -> Vec<provider_pool_manager::pool::ProviderEntry> {
    selector_store(selector).entries(family).await
}

fn selector_store(selector: &Selector) -> PoolStore {
    selector.store()
}
