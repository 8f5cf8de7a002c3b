//! Health Probe Engine: quota-query ("Mode A") and chat-send ("Mode B")
//! provider health probes (spec.md §4.3, §4.4).

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::adapter::{AdapterFactory, ProviderAdapter};
use crate::kiro_usage::{format_kiro_usage, RawKiroUsage};
use crate::pool::{PoolStore, ProviderFamily, UsageInfo};

/// Outcome of a single `probe()` call (spec.md §4.3 contract).
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub success: bool,
    pub model_name: String,
    pub error_message: Option<String>,
    pub usage_info: Option<UsageInfo>,
}

/// Evaluates provider entries and updates their health state.
#[derive(Clone)]
pub struct ProbeEngine {
    store: PoolStore,
    adapters: Arc<dyn AdapterFactory>,
}

impl ProbeEngine {
    pub fn new(store: PoolStore, adapters: Arc<dyn AdapterFactory>) -> Self {
        Self { store, adapters }
    }

    /// `probe(family, entry, forceCheck) -> result | null` (spec.md §4.3).
    ///
    /// Returns `None` when no probe is defined for this family/entry
    /// (gated off and not forced, or no adapter available).
    pub async fn probe(&self, family: &str, uuid: Uuid, force_check: bool) -> Option<ProbeResult> {
        let entries = self.store.entries(family).await;
        let entry = entries.into_iter().find(|e| e.uuid == uuid)?;

        if !entry.check_health && !force_check {
            return None;
        }

        let family_kind = ProviderFamily::parse(family);
        let model_name = entry.probe_model(&family_kind);

        self.adapters.invalidate(family, uuid).await;
        let adapter = self
            .adapters
            .adapter_for(family, uuid, &entry.credentials)
            .await?;

        if family_kind.supports_usage_query() {
            if let Some(result) = self
                .try_mode_a(family, uuid, &model_name, adapter.as_ref())
                .await
            {
                return Some(result);
            }
        }

        Some(self.run_mode_b(family_kind, adapter.as_ref(), &model_name).await)
    }

    /// Mode A: quota-query. Returns `None` to signal "fall back to Mode B"
    /// (capability absent, or the quota call itself failed).
    async fn try_mode_a(
        &self,
        family: &str,
        uuid: Uuid,
        model_name: &str,
        adapter: &dyn ProviderAdapter,
    ) -> Option<ProbeResult> {
        if let Some(refresh) = adapter.force_refresh_token().await {
            if let Err(e) = refresh {
                tracing::warn!(family, %uuid, error = %e, "force refresh before quota probe failed, continuing");
            }
        } else if let Some(refresh) = adapter.refresh_token().await {
            if let Err(e) = refresh {
                tracing::warn!(family, %uuid, error = %e, "refresh before quota probe failed, continuing");
            }
        }

        let raw_result = adapter.get_usage_limits().await?;
        let raw_value = match raw_result {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(family, %uuid, error = %e, "quota query failed, falling back to chat-send probe");
                return None;
            }
        };

        let raw: RawKiroUsage = match serde_json::from_value(raw_value) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(family, %uuid, error = %e, "quota document did not parse, falling back to chat-send probe");
                return None;
            }
        };

        let verdict = format_kiro_usage(&raw);

        self.store
            .with_entry_mut(family, uuid, |entry| {
                entry.usage_info = Some(verdict.usage_info.clone());
                entry.last_health_check_time = Some(chrono::Utc::now());
            })
            .await;
        self.store.schedule_save(family).await;

        Some(ProbeResult {
            success: verdict.healthy,
            model_name: model_name.to_string(),
            error_message: verdict.message,
            usage_info: Some(verdict.usage_info),
        })
    }

    /// Mode B: chat-send with per-family payload fallbacks (spec.md §4.3).
    async fn run_mode_b(
        &self,
        family_kind: ProviderFamily,
        adapter: &dyn ProviderAdapter,
        model_name: &str,
    ) -> ProbeResult {
        let payloads = mode_b_payloads(&family_kind, model_name);
        let mut last_error = None;

        for payload in payloads {
            match adapter.generate_content(model_name, payload).await {
                Ok(_) => {
                    return ProbeResult {
                        success: true,
                        model_name: model_name.to_string(),
                        error_message: None,
                        usage_info: None,
                    };
                }
                Err(e) => {
                    last_error = Some(e.message);
                }
            }
        }

        ProbeResult {
            success: false,
            model_name: model_name.to_string(),
            error_message: last_error,
            usage_info: None,
        }
    }

    /// Asynchronous recovery (spec.md §4.4). Invoked fire-and-forget by
    /// the selector once an unhealthy entry's cool-down has elapsed.
    pub async fn run_recovery(&self, family: &str, uuid: Uuid) {
        match self.probe(family, uuid, true).await {
            Some(result) if result.success => {
                self.store
                    .mark_healthy(family, uuid, false, Some(result.model_name))
                    .await;
            }
            Some(result) => {
                self.store
                    .with_entry_mut(family, uuid, |entry| {
                        entry.last_error_message = result.error_message.clone();
                        entry.last_health_check_time = Some(chrono::Utc::now());
                        entry.last_health_check_model = Some(result.model_name.clone());
                    })
                    .await;
                self.store.schedule_save(family).await;
            }
            None => {
                // No probe defined for this entry; nothing to update.
            }
        }
    }
}

/// Ordered chat-send payload candidates for a family (spec.md §4.3 Mode B
/// step 1).
fn mode_b_payloads(family_kind: &ProviderFamily, model_name: &str) -> Vec<Value> {
    match family_kind {
        ProviderFamily::GeminiCliOauth | ProviderFamily::GeminiAntigravity => {
            vec![gemini_payload(None)]
        }
        ProviderFamily::ClaudeKiroOauth => vec![
            json!({
                "messages": [{"role": "user", "content": "Hi"}],
                "model": model_name,
                "max_tokens": 1,
            }),
            gemini_payload(Some(1)),
        ],
        ProviderFamily::OpenaiResponsesCustom => vec![json!({
            "input": [{"role": "user", "content": "Hi"}],
            "model": model_name,
        })],
        _ => vec![json!({
            "messages": [{"role": "user", "content": "Hi"}],
            "model": model_name,
        })],
    }
}

fn gemini_payload(max_tokens: Option<u32>) -> Value {
    let mut payload = json!({
        "contents": [{"role": "user", "parts": [{"text": "Hi"}]}],
    });
    if let Some(max_tokens) = max_tokens {
        payload["max_tokens"] = json!(max_tokens);
    }
    payload
}
