//! Pool state, data model, and persistence (spec.md §3, §4.6).

pub mod model;
pub mod store;

pub use model::{PoolDocument, ProviderEntry, ProviderFamily, UsageInfo};
pub use store::{PersistenceError, PoolStore};
