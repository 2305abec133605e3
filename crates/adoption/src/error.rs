use shelter_core::{
    AdoptionPatchError, AvailabilityError, FollowUpError, IdError, TransitionError,
    ValidationError,
};
use shelter_storage::StorageError;

/// Coarse classification used by outer layers (HTTP status, exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Conflict,
    Internal,
}

/// Errors returned by [`AdoptionWorkflow`](crate::AdoptionWorkflow) operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    InvalidId(#[from] IdError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A list filter or query parameter could not be interpreted.
    #[error("{0}")]
    InvalidQuery(String),

    #[error("animal is not available for adoption")]
    AnimalNotAvailable,

    #[error("application must be approved before creating adoption")]
    ApplicationNotApproved,

    #[error("adoption already exists for this application")]
    AdoptionExists,

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    FollowUp(#[from] FollowUpError),

    /// The animal left `available` between the approval and the adoption.
    #[error(transparent)]
    AnimalTaken(#[from] AvailabilityError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::InvalidId(_)
            | WorkflowError::Validation(_)
            | WorkflowError::InvalidQuery(_)
            | WorkflowError::AnimalNotAvailable
            | WorkflowError::ApplicationNotApproved
            | WorkflowError::AdoptionExists
            | WorkflowError::Transition(_)
            | WorkflowError::FollowUp(_) => ErrorKind::BadRequest,
            WorkflowError::AnimalTaken(_) => ErrorKind::Conflict,
            WorkflowError::Storage(e) => match e {
                StorageError::NotFound { .. } => ErrorKind::NotFound,
                StorageError::ConcurrentConflict { .. }
                | StorageError::AlreadyExists { .. }
                | StorageError::DuplicateAdoption { .. } => ErrorKind::Conflict,
                StorageError::Backend(_) => ErrorKind::Internal,
            },
        }
    }
}

impl From<AdoptionPatchError> for WorkflowError {
    fn from(e: AdoptionPatchError) -> Self {
        match e {
            AdoptionPatchError::Transition(t) => WorkflowError::Transition(t),
            AdoptionPatchError::Invalid(v) => WorkflowError::Validation(v),
        }
    }
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;
