use std::time::Duration;

use serde::{Deserialize, Serialize};
use shelter_core::TransitionPolicy;

/// Tunables of the adoption workflow. Every field has a default so a
/// partial `[workflow]` table is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub transition_policy: TransitionPolicy,
    /// Page size when a list request does not give one.
    pub default_list_limit: usize,
    /// Upper bound applied to any requested page size.
    pub max_list_limit: usize,
    /// Day offsets used when follow-ups are requested without intervals.
    pub default_follow_up_intervals: Vec<u32>,
    pub audit: AuditConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            transition_policy: TransitionPolicy::Permissive,
            default_list_limit: 20,
            max_list_limit: 100,
            default_follow_up_intervals: vec![7, 30, 90],
            audit: AuditConfig::default(),
        }
    }
}

impl WorkflowConfig {
    /// Resolve a requested page size against the configured bounds.
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        match requested {
            None | Some(0) => self.default_list_limit,
            Some(n) => n.min(self.max_list_limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Delivery attempts per entry before it is dropped.
    pub max_attempts: u32,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 50,
        }
    }
}

impl AuditConfig {
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}
