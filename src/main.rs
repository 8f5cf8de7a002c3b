//! Provider Pool Manager — process entry point.
//!
//! Starts the periodic supervisor sweep against the on-disk pool document.
//! The HTTP façade and service adapters that would normally plug into this
//! process are external collaborators (spec.md §1) and are not part of
//! this binary; it exists to demonstrate configuration, logging, and
//! supervisor wiring the way the rest of this crate is built.

use std::sync::Arc;

use async_trait::async_trait;
use provider_pool_manager::adapter::{AdapterFactory, ProviderAdapter};
use provider_pool_manager::{Config, PoolStore, ProbeEngine, Supervisor};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Placeholder factory used when no adapter layer is wired in: every probe
/// reports "not defined for this entry" rather than fabricating a fake
/// network call.
struct NullAdapterFactory;

#[async_trait]
impl AdapterFactory for NullAdapterFactory {
    async fn adapter_for(
        &self,
        _family: &str,
        _uuid: uuid::Uuid,
        _credentials: &serde_json::Value,
    ) -> Option<Arc<dyn ProviderAdapter>> {
        None
    }

    async fn invalidate(&self, _family: &str, _uuid: uuid::Uuid) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("provider_pool_manager={}", config.log_level.as_filter_str()).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        path = %config.pool_file_path.display(),
        max_error_count = config.max_error_count,
        health_check_interval_ms = config.health_check_interval.as_millis() as u64,
        "loaded provider pool manager configuration"
    );

    let store = PoolStore::load(&config).await;
    let probe_engine = ProbeEngine::new(store.clone(), Arc::new(NullAdapterFactory));
    let supervisor = Supervisor::new(store.clone(), config.clone(), probe_engine);

    info!("starting supervisor sweep");
    let sweep_interval = config.health_check_interval;

    let shutdown_store = store.clone();
    tokio::select! {
        _ = supervisor.run_forever(sweep_interval) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested, flushing pending pool state");
            shutdown_store.flush_now().await;
        }
    }

    Ok(())
}
