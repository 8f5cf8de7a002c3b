//! Supervisor: periodic sweep across every entry in every family
//! (spec.md §4.5).

use chrono::Utc;

use crate::config::Config;
use crate::pool::PoolStore;
use crate::probe::ProbeEngine;

/// Periodic health-check sweep, independent of selection-triggered
/// recovery (spec.md §2 component 5).
#[derive(Clone)]
pub struct Supervisor {
    store: PoolStore,
    config: Config,
    probe_engine: ProbeEngine,
}

impl Supervisor {
    pub fn new(store: PoolStore, config: Config, probe_engine: ProbeEngine) -> Self {
        Self {
            store,
            config,
            probe_engine,
        }
    }

    /// `performHealthChecks(isInit)` (spec.md §6). When `is_init` is true,
    /// every entry is force-probed regardless of its `checkHealth` flag,
    /// matching the one-shot startup sweep an operator triggers before the
    /// first periodic tick.
    pub async fn perform_health_checks(&self, is_init: bool) {
        let families: Vec<String> = self
            .store
            .snapshot_all()
            .await
            .into_keys()
            .collect();

        for family in families {
            let entries = self.store.entries(&family).await;
            for entry in entries {
                if !entry.is_healthy {
                    if let Some(last_error_time) = entry.last_error_time {
                        let elapsed = Utc::now().signed_duration_since(last_error_time);
                        let interval =
                            chrono::Duration::from_std(self.config.health_check_interval)
                                .unwrap_or(chrono::Duration::zero());
                        if elapsed < interval {
                            continue;
                        }
                    }
                }

                match self.probe_engine.probe(&family, entry.uuid, is_init).await {
                    None => {
                        self.store.reset_counters(&family, entry.uuid).await;
                    }
                    Some(result) if result.success => {
                        self.store
                            .mark_healthy(&family, entry.uuid, true, Some(result.model_name))
                            .await;
                    }
                    Some(result) => {
                        self.store
                            .mark_unhealthy(
                                &family,
                                entry.uuid,
                                result.error_message,
                                self.config.max_error_count,
                            )
                            .await;
                        self.store
                            .with_entry_mut(&family, entry.uuid, |e| {
                                e.last_health_check_time = Some(Utc::now());
                                e.last_health_check_model = Some(result.model_name.clone());
                            })
                            .await;
                        self.store.schedule_save(&family).await;
                    }
                }
            }
        }
    }

    /// Run the sweep on a fixed interval until the supplied token is
    /// cancelled. Intended to be spawned once at startup.
    pub async fn run_forever(self, tick: std::time::Duration) {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            self.perform_health_checks(false).await;
        }
    }
}
