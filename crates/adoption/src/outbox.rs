//! In-process audit outbox.
//!
//! Workflow operations enqueue entries without waiting; a background task
//! delivers them to the [`AuditSink`], retrying with linear backoff and
//! dropping an entry (with a warning) once its attempts are exhausted.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::audit::{AuditEntry, AuditSink};
use crate::config::AuditConfig;

enum OutboxMessage {
    Entry(AuditEntry),
    /// Acknowledged once every entry queued before it has been handled.
    Flush(oneshot::Sender<()>),
}

/// Sending half of the outbox. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AuditOutbox {
    tx: mpsc::UnboundedSender<OutboxMessage>,
}

impl std::fmt::Debug for OutboxMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutboxMessage::Entry(entry) => f.debug_tuple("Entry").field(&entry.id).finish(),
            OutboxMessage::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl AuditOutbox {
    /// Start the dispatcher task. Must be called inside a tokio runtime.
    ///
    /// The task ends once every `AuditOutbox` clone has been dropped and
    /// the queue is drained.
    pub fn spawn<A: AuditSink>(sink: A, config: AuditConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(dispatch(sink, config, rx));
        (Self { tx }, handle)
    }

    /// Queue an entry. Never blocks and never fails the caller.
    pub fn enqueue(&self, entry: AuditEntry) {
        if let Err(mpsc::error::SendError(OutboxMessage::Entry(entry))) =
            self.tx.send(OutboxMessage::Entry(entry))
        {
            tracing::warn!(
                audit_id = %entry.id,
                entity_type = %entry.entity_type,
                entity_id = %entry.entity_id,
                "audit outbox closed, entry dropped"
            );
        }
    }

    /// Wait until everything queued so far has been delivered or dropped.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(OutboxMessage::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

async fn dispatch<A: AuditSink>(
    sink: A,
    config: AuditConfig,
    mut rx: mpsc::UnboundedReceiver<OutboxMessage>,
) {
    while let Some(message) = rx.recv().await {
        match message {
            OutboxMessage::Entry(entry) => deliver(&sink, &config, &entry).await,
            OutboxMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("audit outbox drained");
}

async fn deliver<A: AuditSink>(sink: &A, config: &AuditConfig, entry: &AuditEntry) {
    let attempts = config.max_attempts.max(1);
    for attempt in 1..=attempts {
        match sink.record(entry).await {
            Ok(()) => return,
            Err(e) if attempt < attempts => {
                tracing::debug!(audit_id = %entry.id, attempt, error = %e, "audit write failed, retrying");
                tokio::time::sleep(config.backoff(attempt)).await;
            }
            Err(e) => {
                tracing::warn!(
                    audit_id = %entry.id,
                    actor = %entry.actor,
                    action = %entry.action,
                    entity_type = %entry.entity_type,
                    entity_id = %entry.entity_id,
                    attempts,
                    error = %e,
                    "audit entry dropped"
                );
            }
        }
    }
}
