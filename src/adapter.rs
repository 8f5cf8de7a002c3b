//! Adapter capability contract (spec.md §6).
//!
//! The manager never implements provider-specific request/response
//! translation or credential refresh itself — those live in the service
//! adapters, an external collaborator out of scope here (spec.md §1). This
//! module only defines the narrow trait the manager depends on, modeled on
//! how the teacher crate defines its own provider-facing traits
//! (`llm::LLMProvider`-shaped: async, object-safe, one method per
//! capability).

use async_trait::async_trait;
use serde_json::Value;

/// Error returned by an adapter call. The manager treats the message as
/// opaque (spec.md §7: "the precise kind ... is opaque to the manager").
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct AdapterError {
    pub message: String,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The capability contract a provider adapter exposes to the manager.
///
/// `generate_content` is required; the usage-query and refresh methods are
/// optional capabilities an adapter may or may not support, expressed here
/// as `Option`-returning probes rather than a separate marker trait so a
/// single adapter instance can answer "do you support X" at runtime.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Send a chat-completion-shaped request and return the raw adapter
    /// response, or an error. Used by Mode-B health probes and by hot-path
    /// serving (out of scope here; callers invoke this directly).
    async fn generate_content(
        &self,
        model_name: &str,
        request_payload: Value,
    ) -> Result<Value, AdapterError>;

    /// Query remaining usage/quota, if this adapter's family supports it
    /// (spec.md §4.3 Mode A). Returns `None` when the capability isn't
    /// implemented for this adapter; the engine should try Mode B instead.
    async fn get_usage_limits(&self) -> Option<Result<Value, AdapterError>> {
        None
    }

    /// Attempt an ordinary token refresh before a Mode-A probe. `None`
    /// means the adapter has no refresh capability.
    async fn refresh_token(&self) -> Option<Result<(), AdapterError>> {
        None
    }

    /// Attempt a forced token refresh (bypassing any "not yet expired"
    /// check). Preferred over `refresh_token` when available.
    async fn force_refresh_token(&self) -> Option<Result<(), AdapterError>> {
        None
    }
}

/// Acquires a fresh [`ProviderAdapter`] for a given family/uuid, clearing
/// any cached instance first so a probe always exercises current
/// credentials (spec.md §4.3 "Adapter acquisition").
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn adapter_for(
        &self,
        family: &str,
        uuid: uuid::Uuid,
        credentials: &Value,
    ) -> Option<std::sync::Arc<dyn ProviderAdapter>>;

    /// Drop any cached adapter instance for `(family, uuid)`.
    async fn invalidate(&self, family: &str, uuid: uuid::Uuid);
}
