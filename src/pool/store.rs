//! In-memory pool state plus the coalesced persistence layer.
//!
//! Grounded on `ai_providers::AIProviderStore`'s load/save-to-disk shape and
//! `provider_health::ModelChainStore`'s atomic-write helper, generalized to
//! a debounced, multi-family writer per spec.md §4.6.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::Config;
use crate::pool::model::{PoolDocument, ProviderEntry, ProviderFamily};

/// Error conditions for the persistence layer. Never surfaced to selection
/// or probe callers — only logged (spec.md §7).
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to read pool document at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("pool document at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write pool document at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Shared, mutable pool state: one entry list per family, plus the
/// round-robin cursors the selector advances.
pub struct PoolState {
    pub(crate) families: HashMap<String, Vec<ProviderEntry>>,
    /// Round-robin cursor keyed by `family` alone or `family:model`
    /// (spec.md §4.1 step 6).
    pub(crate) round_robin: HashMap<String, usize>,
}

/// The pool store: owns the in-memory state, the debounce timer, and the
/// on-disk document path. Cloning shares the same underlying state (it's a
/// thin `Arc` wrapper), matching `AIProviderStore`'s `Clone` semantics.
#[derive(Clone)]
pub struct PoolStore {
    state: Arc<RwLock<PoolState>>,
    pending: Arc<Mutex<PendingSaves>>,
    path: PathBuf,
    debounce: Duration,
}

struct PendingSaves {
    families: std::collections::HashSet<String>,
    timer_armed: bool,
}

impl PoolStore {
    /// Load the pool document from `config.pool_file_path`, defaulting to
    /// an empty pool if the file doesn't exist (spec.md §7).
    pub async fn load(config: &Config) -> Self {
        let path = config.pool_file_path.clone();
        let families = match Self::read_document(&path) {
            Ok(doc) => doc
                .into_iter()
                .map(|(family, entries)| (family, entries))
                .collect(),
            Err(PersistenceError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                HashMap::new()
            }
            Err(e) => {
                tracing::error!("failed to load pool document, starting empty: {e}");
                HashMap::new()
            }
        };

        Self {
            state: Arc::new(RwLock::new(PoolState {
                families,
                round_robin: HashMap::new(),
            })),
            pending: Arc::new(Mutex::new(PendingSaves {
                families: std::collections::HashSet::new(),
                timer_armed: false,
            })),
            path,
            debounce: config.save_debounce_time,
        }
    }

    fn read_document(path: &PathBuf) -> Result<PoolDocument, PersistenceError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| PersistenceError::Read {
                path: path.clone(),
                source,
            })?;
        serde_json::from_str(&contents).map_err(|source| PersistenceError::Parse {
            path: path.clone(),
            source,
        })
    }

    /// Read-only access to a family's entry list, cloned out from under the
    /// lock. Empty vec if the family is unknown.
    pub async fn entries(&self, family: &str) -> Vec<ProviderEntry> {
        let state = self.state.read().await;
        state.families.get(family).cloned().unwrap_or_default()
    }

    /// Snapshot every entry in a family (diagnostics; §B.1 of SPEC_FULL.md).
    pub async fn snapshot(&self, family: &str) -> Vec<ProviderEntry> {
        self.entries(family).await
    }

    /// Snapshot the whole pool.
    pub async fn snapshot_all(&self) -> BTreeMap<String, Vec<ProviderEntry>> {
        let state = self.state.read().await;
        state
            .families
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Mutate a single entry by uuid under the write lock; returns whether
    /// an entry was found. Invalid/missing uuid is a no-op (spec.md §7).
    pub(crate) async fn with_entry_mut<F>(&self, family: &str, uuid: Uuid, f: F) -> bool
    where
        F: FnOnce(&mut ProviderEntry),
    {
        let mut state = self.state.write().await;
        match state
            .families
            .get_mut(family)
            .and_then(|entries| entries.iter_mut().find(|e| e.uuid == uuid))
        {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }

    pub(crate) async fn read_state(&self) -> tokio::sync::RwLockReadGuard<'_, PoolState> {
        self.state.read().await
    }

    pub(crate) async fn write_state(&self) -> tokio::sync::RwLockWriteGuard<'_, PoolState> {
        self.state.write().await
    }

    pub async fn disable(&self, family: &str, uuid: Uuid) {
        self.with_entry_mut(family, uuid, |e| e.is_disabled = true)
            .await;
        self.schedule_save(family).await;
    }

    pub async fn enable(&self, family: &str, uuid: Uuid) {
        self.with_entry_mut(family, uuid, |e| e.is_disabled = false)
            .await;
        self.schedule_save(family).await;
    }

    pub async fn reset_counters(&self, family: &str, uuid: Uuid) {
        self.with_entry_mut(family, uuid, |e| {
            e.error_count = 0;
            e.usage_count = 0;
            e.last_error_time = None;
            e.last_error_message = None;
        })
        .await;
        self.schedule_save(family).await;
    }

    /// Mark an entry unhealthy per spec.md §4.2. Increments `error_count`;
    /// flips `is_healthy` false once `max_error_count` is reached.
    pub async fn mark_unhealthy(
        &self,
        family: &str,
        uuid: Uuid,
        error_message: Option<String>,
        max_error_count: u32,
    ) {
        let mut became_unhealthy = false;
        let mut error_count = 0;
        self.with_entry_mut(family, uuid, |e| {
            e.error_count = e.error_count.saturating_add(1);
            e.last_error_time = Some(Utc::now());
            e.last_error_message = error_message.clone();
            if e.error_count >= max_error_count {
                e.is_healthy = false;
                became_unhealthy = true;
            }
            error_count = e.error_count;
        })
        .await;

        if became_unhealthy {
            tracing::warn!(family, %uuid, error_count, "provider entry marked unhealthy");
        } else {
            tracing::info!(family, %uuid, error_count, "provider entry recorded a failure");
        }

        self.schedule_save(family).await;
    }

    /// Mark an entry healthy per spec.md §4.2.
    pub async fn mark_healthy(
        &self,
        family: &str,
        uuid: Uuid,
        reset_usage_count: bool,
        health_check_model: Option<String>,
    ) {
        self.with_entry_mut(family, uuid, |e| {
            e.is_healthy = true;
            e.error_count = 0;
            e.last_error_time = None;
            e.last_error_message = None;
            e.last_health_check_time = Some(Utc::now());
            if let Some(model) = health_check_model {
                e.last_health_check_model = Some(model);
            }
            if reset_usage_count {
                e.usage_count = 0;
            } else {
                e.usage_count = e.usage_count.saturating_add(1);
                e.last_used = Some(Utc::now());
            }
        })
        .await;

        tracing::info!(family, %uuid, "provider entry marked healthy");
        self.schedule_save(family).await;
    }

    /// Arm (or re-arm) the debounce timer for `family`. Coalesces repeated
    /// calls within `debounce` into a single write (spec.md §4.6).
    pub async fn schedule_save(&self, family: &str) {
        let mut pending = self.pending.lock().await;
        pending.families.insert(family.to_string());

        if pending.timer_armed {
            // A timer is already running; it will flush everything in
            // `pending.families` once it fires, including this family. No
            // need to arm a second one — that's the "coalesce" part.
            return;
        }
        pending.timer_armed = true;
        drop(pending);

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.debounce).await;
            this.flush().await;
        });
    }

    /// Fire the debounce timer: snapshot pending families, clear the
    /// pending set, write them out, and re-arm a fresh timer if new
    /// families arrived (via `schedule_save`) while the write was in
    /// flight.
    async fn flush(&self) {
        let families: Vec<String> = {
            let mut pending = self.pending.lock().await;
            pending.timer_armed = false;
            pending.families.drain().collect()
        };

        if !families.is_empty() {
            if let Err(e) = self.write_families(&families).await {
                tracing::error!("pool document flush failed, will retry on next save: {e}");
            }
        }

        let mut pending = self.pending.lock().await;
        if pending.families.is_empty() || pending.timer_armed {
            return;
        }
        pending.timer_armed = true;
        drop(pending);

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.debounce).await;
            this.flush().await;
        });
    }

    /// Perform one synchronous flush of every currently pending family.
    /// Intended for shutdown handlers (SPEC_FULL.md §B.3).
    pub async fn flush_now(&self) {
        let families: Vec<String> = {
            let mut pending = self.pending.lock().await;
            pending.timer_armed = false;
            pending.families.drain().collect()
        };
        if families.is_empty() {
            return;
        }
        if let Err(e) = self.write_families(&families).await {
            tracing::error!("final pool document flush failed: {e}");
        }
    }

    /// Reconcile in-memory entries for `families` into the on-disk
    /// document and write it atomically (temp file + rename).
    async fn write_families(&self, families: &[String]) -> Result<(), PersistenceError> {
        let mut doc = match Self::read_document(&self.path) {
            Ok(doc) => doc,
            Err(PersistenceError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                PoolDocument::new()
            }
            Err(e) => return Err(e),
        };

        {
            let state = self.state.read().await;
            for family in families {
                match state.families.get(family) {
                    Some(entries) => {
                        doc.insert(family.clone(), entries.clone());
                    }
                    None => {
                        doc.remove(family);
                    }
                }
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| PersistenceError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        let contents =
            serde_json::to_string_pretty(&doc).map_err(|source| PersistenceError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &contents).map_err(|source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(families = ?families, "flushed pool document");
        Ok(())
    }

    /// Resolve the [`ProviderFamily`] kind for a family string (dispatch
    /// helper for the selector/probe engine).
    pub fn family_kind(family: &str) -> ProviderFamily {
        ProviderFamily::parse(family)
    }
}
