//! Provider pool data model.
//!
//! A single entry per credential/account, grouped by provider family.
//! Mirrors the shape of `ai_providers::AIProvider`, but replaces the
//! free-form attribute bag with explicit optional fields plus a
//! `#[serde(flatten)]` extras map so unknown keys (e.g. human-added
//! `_comment`) survive a load/save round-trip untouched.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider family key. The family determines request shape and
/// health-check defaults; unrecognized strings from the on-disk document
/// are preserved as `Other` so the document never loses data on load/save.
///
/// The document itself keys families by plain string (spec.md §6), so this
/// enum is never serialized directly — it's derived from the family string
/// on demand via [`ProviderFamily::parse`] wherever family-specific
/// behavior (probe defaults, payload shape) is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
    GeminiCliOauth,
    GeminiAntigravity,
    OpenaiCustom,
    ClaudeCustom,
    ClaudeKiroOauth,
    OpenaiQwenOauth,
    OpenaiResponsesCustom,
    Other(String),
}

impl ProviderFamily {
    pub fn parse(family: &str) -> Self {
        match family {
            "gemini-cli-oauth" => Self::GeminiCliOauth,
            "gemini-antigravity" => Self::GeminiAntigravity,
            "openai-custom" => Self::OpenaiCustom,
            "claude-custom" => Self::ClaudeCustom,
            "claude-kiro-oauth" => Self::ClaudeKiroOauth,
            "openai-qwen-oauth" => Self::OpenaiQwenOauth,
            "openaiResponses-custom" => Self::OpenaiResponsesCustom,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::GeminiCliOauth => "gemini-cli-oauth",
            Self::GeminiAntigravity => "gemini-antigravity",
            Self::OpenaiCustom => "openai-custom",
            Self::ClaudeCustom => "claude-custom",
            Self::ClaudeKiroOauth => "claude-kiro-oauth",
            Self::OpenaiQwenOauth => "openai-qwen-oauth",
            Self::OpenaiResponsesCustom => "openaiResponses-custom",
            Self::Other(s) => s.as_str(),
        }
    }

    /// The family's default chat-send probe model, used when an entry has
    /// no `check_model_name` of its own.
    pub fn default_check_model(&self) -> &str {
        match self {
            Self::GeminiCliOauth | Self::GeminiAntigravity => "gemini-2.5-flash",
            Self::OpenaiCustom => "gpt-3.5-turbo",
            Self::ClaudeCustom => "claude-3-7-sonnet-20250219",
            Self::ClaudeKiroOauth => "claude-haiku-4-5",
            Self::OpenaiQwenOauth => "qwen3-coder-flash",
            Self::OpenaiResponsesCustom => "gpt-4o-mini",
            Self::Other(_) => "gpt-3.5-turbo",
        }
    }

    /// Families for which the quota-query ("Mode A") probe is attempted
    /// before falling back to chat-send. Per spec.md §4.3, currently only
    /// `claude-kiro-oauth`.
    pub fn supports_usage_query(&self) -> bool {
        matches!(self, Self::ClaudeKiroOauth)
    }
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cached quota snapshot from the last successful Mode-A probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageInfo {
    pub total_used: f64,
    pub total_limit: f64,
    pub remaining: f64,
    pub usage_percent: f64,
    pub has_active_quota: bool,
    pub checked_at: DateTime<Utc>,
}

/// A single credential/account within a family.
///
/// Field names are `camelCase` on the wire to match the on-disk pool
/// document (§3, §6 of spec.md); in-memory they're idiomatic snake_case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEntry {
    pub uuid: Uuid,

    /// Family-specific opaque config (paths, tokens, endpoints). Kept as a
    /// raw JSON value: the manager never interprets it, only the adapter
    /// layer (out of scope, see spec.md §1) does.
    pub credentials: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_model_name: Option<String>,

    #[serde(default = "default_true")]
    pub check_health: bool,

    #[serde(default)]
    pub not_supported_models: HashSet<String>,

    #[serde(default = "default_true")]
    pub is_healthy: bool,

    #[serde(default)]
    pub is_disabled: bool,

    #[serde(default)]
    pub error_count: u32,

    #[serde(default)]
    pub usage_count: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_info: Option<UsageInfo>,

    /// Preserved unknown keys (e.g. `_comment`, `_originalId`) so operator
    /// annotations in the on-disk document survive a load/save cycle.
    #[serde(flatten)]
    pub extras: serde_json::Map<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl ProviderEntry {
    /// Build a fresh entry with every counter at its spec.md §3 default.
    pub fn new(uuid: Uuid, credentials: serde_json::Value) -> Self {
        Self {
            uuid,
            credentials,
            check_model_name: None,
            check_health: true,
            not_supported_models: HashSet::new(),
            is_healthy: true,
            is_disabled: false,
            error_count: 0,
            usage_count: 0,
            last_used: None,
            last_error_time: None,
            last_error_message: None,
            last_health_check_time: None,
            last_health_check_model: None,
            usage_info: None,
            extras: serde_json::Map::new(),
        }
    }

    /// Resolve the model name to use for a health probe: the entry's own
    /// override, or the family default.
    pub fn probe_model(&self, family: &ProviderFamily) -> String {
        self.check_model_name
            .clone()
            .unwrap_or_else(|| family.default_check_model().to_string())
    }
}

/// The on-disk pool document: family name -> ordered entry list.
pub type PoolDocument = std::collections::BTreeMap<String, Vec<ProviderEntry>>;
