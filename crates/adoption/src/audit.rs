//! Audit entries and the sinks that persist them.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shelter_core::{ActorId, ChangeSet};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        })
    }
}

/// Entity type labels used in audit entries.
pub mod entity {
    pub const APPLICATION: &str = "adoption_application";
    pub const ADOPTION: &str = "adoption";
}

/// Who did what to which entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor: ActorId,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "ChangeSet::is_empty")]
    pub changes: ChangeSet,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl AuditEntry {
    pub fn new(
        actor: ActorId,
        action: AuditAction,
        entity_type: &str,
        entity_id: impl fmt::Display,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor,
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            changes: ChangeSet::new(),
            timestamp,
        }
    }

    pub fn with_changes(mut self, changes: ChangeSet) -> Self {
        self.changes = changes;
        self
    }
}

#[derive(Debug, thiserror::Error)]
#[error("audit sink unavailable: {0}")]
pub struct AuditError(pub String);

/// Append-only destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Writes each entry as a structured `tracing` event on `shelter::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let changes = serde_json::to_string(&entry.changes)
            .map_err(|e| AuditError(format!("serialize changes: {e}")))?;
        tracing::info!(
            target: "shelter::audit",
            audit_id = %entry.id,
            actor = %entry.actor,
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            changes = %changes,
            timestamp = %entry.timestamp,
            "audit"
        );
        Ok(())
    }
}

/// Keeps entries in memory; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .map_err(|_| AuditError("memory audit log poisoned".to_string()))?
            .push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl<T: AuditSink> AuditSink for Arc<T> {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        (**self).record(entry).await
    }
}
