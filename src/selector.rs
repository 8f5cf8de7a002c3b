//! Selector: health-preferring, model-filtered, per-(family,model)
//! round-robin provider selection (spec.md §4.1).

use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::pool::{PoolStore, ProviderEntry};
use crate::probe::ProbeEngine;

/// Options for a single `select` call.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Skip the usage-count/`last_used` bump this selection would normally
    /// perform (spec.md §4.1 step 7).
    pub skip_usage_count: bool,
}

/// A successful selection result: the chosen entry's config, plus whether
/// it came from the unhealthy fallback set (spec.md §4.1 step 5).
#[derive(Debug, Clone)]
pub struct Selection {
    pub entry: ProviderEntry,
    pub is_fallback: bool,
}

/// Selects providers for a pool and triggers asynchronous recovery probes
/// on eligible unhealthy entries. Selection itself never awaits a probe or
/// a file write (spec.md §5).
#[derive(Clone)]
pub struct Selector {
    store: PoolStore,
    config: Config,
    probe_engine: ProbeEngine,
}

impl Selector {
    pub fn new(store: PoolStore, config: Config, probe_engine: ProbeEngine) -> Self {
        Self {
            store,
            config,
            probe_engine,
        }
    }

    /// Access the underlying pool store, e.g. to drive operator actions
    /// (`disable`/`enable`/`reset_counters`) alongside selection.
    pub fn store(&self) -> PoolStore {
        self.store.clone()
    }

    /// `select(family, requestedModel?, opts?) -> entry | null` (spec.md
    /// §4.1).
    pub async fn select(
        &self,
        family: &str,
        requested_model: Option<&str>,
        opts: SelectOptions,
    ) -> Option<Selection> {
        if family.is_empty() {
            tracing::error!("select called with empty family");
            return None;
        }

        let entries = self.store.entries(family).await;
        if entries.is_empty() {
            return None;
        }

        // Step 2: drop disabled entries.
        let enabled: Vec<ProviderEntry> = entries.into_iter().filter(|e| !e.is_disabled).collect();
        if enabled.is_empty() {
            return None;
        }

        // Step 3: model filter.
        let model_filtered: Vec<ProviderEntry> = match requested_model {
            Some(model) => enabled
                .into_iter()
                .filter(|e| !e.not_supported_models.contains(model))
                .collect(),
            None => enabled,
        };
        if model_filtered.is_empty() {
            return None;
        }

        // Step 4: recovery-trigger sweep over the model-filtered set.
        self.trigger_recovery_sweep(family, &model_filtered).await;

        // Step 5: prefer healthy; fall back to the whole enabled set.
        let healthy: Vec<&ProviderEntry> = model_filtered.iter().filter(|e| e.is_healthy).collect();
        let (candidates, is_fallback): (Vec<&ProviderEntry>, bool) = if !healthy.is_empty() {
            (healthy, false)
        } else {
            (model_filtered.iter().collect(), true)
        };

        // Step 6: round-robin over `candidates`, keyed by family alone or
        // family+model.
        let rr_key = match requested_model {
            Some(model) => format!("{family}:{model}"),
            None => family.to_string(),
        };
        let chosen_index = {
            let mut state = self.store.write_state().await;
            let len = candidates.len();
            let idx = state.round_robin.entry(rr_key).or_insert(0);
            let chosen = *idx % len;
            *idx = (chosen + 1) % len;
            chosen
        };
        let chosen = candidates[chosen_index].clone();

        // Step 7: usage accounting unless skipped.
        if !opts.skip_usage_count {
            let uuid = chosen.uuid;
            self.store
                .with_entry_mut(family, uuid, |e| {
                    e.last_used = Some(Utc::now());
                    e.usage_count = e.usage_count.saturating_add(1);
                })
                .await;
            self.store.schedule_save(family).await;
        }

        Some(Selection {
            entry: chosen,
            is_fallback,
        })
    }

    /// Step 4 of `select`: for each unhealthy, cooled-down entry, debounce
    /// the cool-down clock and dispatch a fire-and-forget recovery probe.
    /// Never awaited by the caller.
    async fn trigger_recovery_sweep(&self, family: &str, candidates: &[ProviderEntry]) {
        let now = Utc::now();
        for entry in candidates {
            if entry.is_healthy {
                continue;
            }
            let Some(last_error_time) = entry.last_error_time else {
                continue;
            };
            let elapsed = now.signed_duration_since(last_error_time);
            let interval = chrono::Duration::from_std(self.config.health_check_interval)
                .unwrap_or(chrono::Duration::zero());
            if elapsed < interval {
                continue;
            }

            // Debounce: overwrite last_error_time now so a concurrent
            // selection observing the same entry won't re-trigger.
            self.store
                .with_entry_mut(family, entry.uuid, |e| {
                    e.last_error_time = Some(now);
                })
                .await;

            let probe_engine = self.probe_engine.clone();
            let family = family.to_string();
            let uuid = entry.uuid;
            tokio::spawn(async move {
                probe_engine.run_recovery(&family, uuid).await;
            });
        }
    }
}
