//! Kiro usage-document parser (`formatKiroUsage`, spec.md §4.3 / §6).
//!
//! A pure, side-effect-free parser kept as a leaf module so the manager
//! doesn't form a cycle with the quota formatter (Design Note, §9): the
//! probe engine calls it as a plain function, never the other way round.

use serde::Deserialize;

use crate::pool::UsageInfo;

/// One entry in the `usageBreakdown` array of a raw Kiro usage document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageBucket {
    #[serde(default)]
    current_usage: f64,
    #[serde(default)]
    usage_limit: f64,
}

/// A bonus credit grant; only `ACTIVE` ones count toward usable quota.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bonus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    current_usage: f64,
    #[serde(default)]
    usage_limit: f64,
}

/// The raw document shape returned by an adapter's `get_usage_limits`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawKiroUsage {
    #[serde(default)]
    usage_breakdown: Vec<UsageBucket>,
    #[serde(default)]
    free_trial: Option<UsageBucket>,
    #[serde(default)]
    bonuses: Vec<Bonus>,
}

/// The outcome of aggregating a raw usage document: the normalized
/// snapshot plus the health verdict the probe engine derives from it.
pub struct KiroUsageVerdict {
    pub usage_info: UsageInfo,
    pub healthy: bool,
    /// Present only when `healthy` is false.
    pub message: Option<String>,
}

/// Parse and aggregate a raw Kiro usage document into a verdict.
///
/// Sums `current_usage`/`usage_limit` across every breakdown bucket, the
/// optional free-trial bucket, and every `ACTIVE` bonus (spec.md §4.3 step
/// 3). An entry has *active quota* if any contributing bucket has
/// `usage_limit > 0 && current_usage < usage_limit`.
pub fn format_kiro_usage(raw: &RawKiroUsage) -> KiroUsageVerdict {
    let mut total_used = 0.0;
    let mut total_limit = 0.0;
    let mut has_active_quota = false;

    let mut consider = |current_usage: f64, usage_limit: f64| {
        total_used += current_usage;
        total_limit += usage_limit;
        if usage_limit > 0.0 && current_usage < usage_limit {
            has_active_quota = true;
        }
    };

    for bucket in &raw.usage_breakdown {
        consider(bucket.current_usage, bucket.usage_limit);
    }
    if let Some(trial) = &raw.free_trial {
        consider(trial.current_usage, trial.usage_limit);
    }
    for bonus in &raw.bonuses {
        if bonus.status.eq_ignore_ascii_case("ACTIVE") {
            consider(bonus.current_usage, bonus.usage_limit);
        }
    }

    let remaining = total_limit - total_used;
    let usage_percent = if total_limit > 0.0 {
        (100.0 * total_used / total_limit).round()
    } else {
        0.0
    };
    let healthy = has_active_quota && remaining > 0.0;

    let message = if healthy {
        None
    } else if remaining <= 0.0 {
        Some(format!(
            "quota exhausted ({}/{})",
            total_used as i64, total_limit as i64
        ))
    } else {
        Some("no active quota".to_string())
    };

    KiroUsageVerdict {
        usage_info: UsageInfo {
            total_used,
            total_limit,
            remaining,
            usage_percent,
            has_active_quota,
            checked_at: chrono::Utc::now(),
        },
        healthy,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exhausted_is_unhealthy_with_message() {
        let raw = RawKiroUsage {
            usage_breakdown: vec![UsageBucket {
                current_usage: 100.0,
                usage_limit: 100.0,
            }],
            free_trial: None,
            bonuses: vec![],
        };
        let verdict = format_kiro_usage(&raw);
        assert!(!verdict.healthy);
        assert_eq!(verdict.usage_info.remaining, 0.0);
        assert_eq!(verdict.message.as_deref(), Some("quota exhausted (100/100)"));
    }

    #[test]
    fn active_quota_with_remaining_is_healthy() {
        let raw = RawKiroUsage {
            usage_breakdown: vec![UsageBucket {
                current_usage: 40.0,
                usage_limit: 100.0,
            }],
            free_trial: None,
            bonuses: vec![],
        };
        let verdict = format_kiro_usage(&raw);
        assert!(verdict.healthy);
        assert_eq!(verdict.usage_info.remaining, 60.0);
        assert_eq!(verdict.usage_info.usage_percent, 40.0);
    }

    #[test]
    fn inactive_bonus_is_excluded() {
        let raw = RawKiroUsage {
            usage_breakdown: vec![UsageBucket {
                current_usage: 100.0,
                usage_limit: 100.0,
            }],
            free_trial: None,
            bonuses: vec![Bonus {
                status: "EXPIRED".to_string(),
                current_usage: 0.0,
                usage_limit: 50.0,
            }],
        };
        let verdict = format_kiro_usage(&raw);
        assert!(!verdict.healthy);
        assert_eq!(verdict.usage_info.total_limit, 100.0);
    }

    #[test]
    fn active_bonus_contributes_remaining_quota() {
        let raw = RawKiroUsage {
            usage_breakdown: vec![UsageBucket {
                current_usage: 100.0,
                usage_limit: 100.0,
            }],
            free_trial: None,
            bonuses: vec![Bonus {
                status: "ACTIVE".to_string(),
                current_usage: 0.0,
                usage_limit: 50.0,
            }],
        };
        let verdict = format_kiro_usage(&raw);
        assert!(verdict.healthy);
        assert_eq!(verdict.usage_info.remaining, 50.0);
    }
}
