//! Shared test helpers: not a test binary itself (lives under `common/` so
//! cargo doesn't treat it as one).

use std::path::Path;

use provider_pool_manager::pool::{PoolDocument, ProviderEntry};
use serde_json::json;
use uuid::Uuid;

pub fn write_doc(path: &Path, doc: &PoolDocument) {
    let contents = serde_json::to_string_pretty(doc).expect("serialize pool document");
    std::fs::write(path, contents).expect("write pool document fixture");
}

pub fn entry() -> ProviderEntry {
    ProviderEntry::new(Uuid::new_v4(), json!({"apiKey": "test-key"}))
}

pub fn entry_named(name: &str) -> (Uuid, ProviderEntry) {
    let uuid = Uuid::new_v4();
    let mut e = ProviderEntry::new(uuid, json!({"apiKey": name}));
    e.extras.insert("_name".to_string(), json!(name));
    (uuid, e)
}
