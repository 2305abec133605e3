use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::id::AnimalId;

/// Shelter status of an animal. Only `Available` admits new applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimalStatus {
    Available,
    Pending,
    Reserved,
    Adopted,
    Fostered,
    UnderTreatment,
    Quarantine,
    Unavailable,
    Deceased,
    Transferred,
}

impl AnimalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimalStatus::Available => "available",
            AnimalStatus::Pending => "pending",
            AnimalStatus::Reserved => "reserved",
            AnimalStatus::Adopted => "adopted",
            AnimalStatus::Fostered => "fostered",
            AnimalStatus::UnderTreatment => "under_treatment",
            AnimalStatus::Quarantine => "quarantine",
            AnimalStatus::Unavailable => "unavailable",
            AnimalStatus::Deceased => "deceased",
            AnimalStatus::Transferred => "transferred",
        }
    }
}

impl fmt::Display for AnimalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The animal was not `available` when the workflow tried to adopt it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("animal {id} is no longer available (status '{status}')")]
pub struct AvailabilityError {
    pub id: AnimalId,
    pub status: AnimalStatus,
}

/// An animal as seen by the adoption workflow.
///
/// The workflow only ever touches `status` (and the bookkeeping fields);
/// everything else belongs to the animal registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    pub id: AnimalId,
    pub name: String,
    pub species: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    pub status: AnimalStatus,
    /// Optimistic concurrency token, incremented by every committed write.
    #[serde(default)]
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Animal {
    pub fn new(name: impl Into<String>, species: impl Into<String>, now: OffsetDateTime) -> Self {
        Animal {
            id: AnimalId::new(),
            name: name.into(),
            species: species.into(),
            breed: None,
            status: AnimalStatus::Available,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: AnimalStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_available(&self) -> bool {
        self.status == AnimalStatus::Available
    }

    /// Flip `available → adopted`. Any other starting status is refused so
    /// that two adoptions can never claim the same animal.
    pub fn mark_adopted(&mut self, now: OffsetDateTime) -> Result<(), AvailabilityError> {
        if !self.is_available() {
            return Err(AvailabilityError {
                id: self.id,
                status: self.status,
            });
        }
        self.status = AnimalStatus::Adopted;
        self.updated_at = now;
        Ok(())
    }

    /// Put the animal back up for adoption after its adoption was returned.
    ///
    /// Unconditional: a returned animal re-enters availability whatever the
    /// registry recorded in the meantime.
    pub fn mark_returned(&mut self, now: OffsetDateTime) {
        self.status = AnimalStatus::Available;
        self.updated_at = now;
    }
}
