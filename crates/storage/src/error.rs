use std::fmt;

/// The three collections the adoption workflow reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Animal,
    Application,
    Adoption,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Animal => "animal",
            EntityKind::Application => "application",
            EntityKind::Adoption => "adoption",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors that can be returned by a ShelterStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another snapshot modified
    /// the record since it was read. Raised at update or at commit.
    #[error("concurrent conflict on {entity} {id}: expected version {expected_version}")]
    ConcurrentConflict {
        entity: EntityKind,
        id: String,
        expected_version: i64,
    },

    #[error("{entity} not found")]
    NotFound { entity: EntityKind, id: String },

    /// A record with this id already exists.
    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: EntityKind, id: String },

    /// Uniqueness constraint: one adoption record per application.
    #[error("adoption already exists for application {application_id}")]
    DuplicateAdoption { application_id: String },

    /// A backend-specific storage error (connection, serialization, poisoned lock).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        StorageError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: EntityKind, id: impl fmt::Display, expected_version: i64) -> Self {
        StorageError::ConcurrentConflict {
            entity,
            id: id.to_string(),
            expected_version,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    /// Conflicts a caller may resolve by re-reading and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::ConcurrentConflict { .. }
                | StorageError::AlreadyExists { .. }
                | StorageError::DuplicateAdoption { .. }
        )
    }
}
