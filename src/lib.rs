//! # Provider Pool Manager
//!
//! A runtime supervisor that selects among a pool of backend AI-service
//! credentials for each outbound request, tracks per-instance health,
//! performs active health probes, auto-recovers providers after cool-down,
//! and persists pool state to a stable on-disk record.
//!
//! This crate implements only the manager itself (selection, health,
//! persistence). The HTTP façade, per-family request translators, and
//! credential/OAuth refresh mechanics are external collaborators reached
//! through the [`adapter`] module's capability contract.
//!
//! ## Modules
//! - `pool`: the in-memory pool state, data model, and debounced
//!   persistence layer.
//! - `selector`: health-preferring, model-filtered round-robin selection.
//! - `probe`: the dual-mode (quota-query / chat-send) health probe engine.
//! - `supervisor`: the periodic health-check sweep.
//! - `adapter`: the capability contract the manager reaches provider logic
//!   through.
//! - `kiro_usage`: the quota-document parser used by Mode-A probes.

pub mod adapter;
pub mod config;
pub mod kiro_usage;
pub mod pool;
pub mod probe;
pub mod selector;
pub mod supervisor;

pub use config::Config;
pub use pool::PoolStore;
pub use probe::ProbeEngine;
pub use selector::{SelectOptions, Selection, Selector};
pub use supervisor::Supervisor;
