//! shelter-adoption: the use-case layer of the shelter.
//!
//! [`AdoptionWorkflow`] coordinates animals, adoption applications and
//! adoption records through a [`shelter_storage::ShelterStorage`] backend,
//! and reports every committed change to an [`AuditSink`] through the
//! [`AuditOutbox`].

pub mod audit;
mod config;
mod engine;
mod error;
mod outbox;
mod request;

pub use audit::{AuditAction, AuditEntry, AuditError, AuditSink, LogAuditSink, MemoryAuditSink};
pub use config::{AuditConfig, WorkflowConfig};
pub use engine::{AdoptionWorkflow, Clock};
pub use error::{ErrorKind, Result, WorkflowError};
pub use outbox::AuditOutbox;
pub use request::{
    CompleteFollowUpRequest, CreateAdoptionRequest, CreateApplicationRequest,
    ListAdoptionsRequest, ListApplicationsRequest,
};
