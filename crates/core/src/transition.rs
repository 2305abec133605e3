//! Shared state-machine vocabulary: transition policy, transition errors
//! and the change set recorded for audit entries.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How strictly caller-driven status transitions are checked.
///
/// Both policies forbid moving backwards out of a terminal state and
/// forbid callers from setting engine-owned states directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Allows skipping review and re-entering `approved`, `rejected` or
    /// `returned` (administrative override).
    #[default]
    Permissive,
    /// Only adjacent forward moves of the lifecycle.
    Strict,
}

impl fmt::Display for TransitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionPolicy::Permissive => f.write_str("permissive"),
            TransitionPolicy::Strict => f.write_str("strict"),
        }
    }
}

impl std::str::FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "strict" => Ok(TransitionPolicy::Strict),
            other => Err(format!("unknown transition policy '{other}'")),
        }
    }
}

/// A requested status change is not in the entity's transition table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal {entity} status transition from '{from}' to '{to}'")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

impl TransitionError {
    pub fn new(entity: &'static str, from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Field-level changes applied by a patch, keyed by field name.
///
/// Carried into audit entries; values are the new values as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, serde_json::Value>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the new value of `field`. Values that cannot be represented
    /// as JSON are recorded as `null`.
    pub fn record<T: Serialize>(&mut self, field: &str, value: &T) {
        let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.0.insert(field.to_string(), json);
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
