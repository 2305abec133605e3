use async_trait::async_trait;
use shelter_core::{
    AdoptionApplication, AdoptionId, AdoptionRecord, Animal, AnimalId, ApplicationId,
};
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::record::{AdoptionFilter, ApplicationFilter, Page};
use crate::stats::AdoptionStatistics;

/// The persistence gateway for the adoption workflow.
///
/// A `ShelterStorage` implementation provides transactional storage for the
/// three collections the workflow coordinates: animals, adoption
/// applications and adoption records.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` starts a transaction and returns a `Snapshot`
/// 2. Call in-snapshot methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` commits and consumes the transaction,
///    OR `abort_snapshot(snapshot)` rolls back and consumes it
///
/// Writes made inside a snapshot are visible to later reads through the
/// same snapshot and invisible to everyone else until commit. Dropping a
/// snapshot without committing discards it.
///
/// ## OCC Conflict Detection
///
/// `update_*` and `delete_*` carry the version the caller read. A mismatch
/// returns `StorageError::ConcurrentConflict`, either immediately or when
/// the snapshot commits. A successful commit increments the version of every
/// written record.
///
/// ## Uniqueness
///
/// At most one adoption record may reference a given application. A
/// violating insert fails with `StorageError::DuplicateAdoption`, at insert
/// time or at commit.
#[async_trait]
pub trait ShelterStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Animals (within snapshot) ─────────────────────────────────────────────

    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken.
    async fn insert_animal(
        &self,
        snapshot: &mut Self::Snapshot,
        animal: Animal,
    ) -> Result<(), StorageError>;

    async fn get_animal_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        id: AnimalId,
    ) -> Result<Animal, StorageError>;

    /// Returns the new version number on success.
    async fn update_animal(
        &self,
        snapshot: &mut Self::Snapshot,
        animal: Animal,
        expected_version: i64,
    ) -> Result<i64, StorageError>;

    // ── Applications (within snapshot) ────────────────────────────────────────

    async fn insert_application(
        &self,
        snapshot: &mut Self::Snapshot,
        application: AdoptionApplication,
    ) -> Result<(), StorageError>;

    async fn get_application_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        id: ApplicationId,
    ) -> Result<AdoptionApplication, StorageError>;

    async fn update_application(
        &self,
        snapshot: &mut Self::Snapshot,
        application: AdoptionApplication,
        expected_version: i64,
    ) -> Result<i64, StorageError>;

    async fn delete_application(
        &self,
        snapshot: &mut Self::Snapshot,
        id: ApplicationId,
        expected_version: i64,
    ) -> Result<(), StorageError>;

    // ── Adoption records (within snapshot) ────────────────────────────────────

    /// Returns `Err(StorageError::DuplicateAdoption)` if another record
    /// already references the same application.
    async fn insert_adoption(
        &self,
        snapshot: &mut Self::Snapshot,
        record: AdoptionRecord,
    ) -> Result<(), StorageError>;

    async fn get_adoption_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        id: AdoptionId,
    ) -> Result<AdoptionRecord, StorageError>;

    /// The record referencing `application_id`, as seen by this snapshot.
    async fn find_adoption_by_application_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        application_id: ApplicationId,
    ) -> Result<Option<AdoptionRecord>, StorageError>;

    async fn update_adoption(
        &self,
        snapshot: &mut Self::Snapshot,
        record: AdoptionRecord,
        expected_version: i64,
    ) -> Result<i64, StorageError>;

    async fn delete_adoption(
        &self,
        snapshot: &mut Self::Snapshot,
        id: AdoptionId,
        expected_version: i64,
    ) -> Result<(), StorageError>;

    // ── Query operations (outside snapshot, committed state only) ─────────────

    async fn get_animal(&self, id: AnimalId) -> Result<Animal, StorageError>;

    async fn get_application(&self, id: ApplicationId)
        -> Result<AdoptionApplication, StorageError>;

    async fn get_adoption(&self, id: AdoptionId) -> Result<AdoptionRecord, StorageError>;

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Page<AdoptionApplication>, StorageError>;

    async fn list_adoptions(
        &self,
        filter: &AdoptionFilter,
    ) -> Result<Page<AdoptionRecord>, StorageError>;

    /// Every application for the animal, newest first.
    async fn applications_by_animal(
        &self,
        animal_id: AnimalId,
    ) -> Result<Vec<AdoptionApplication>, StorageError>;

    /// Applications still waiting for review (`submitted`), oldest first.
    async fn pending_applications(&self) -> Result<Vec<AdoptionApplication>, StorageError>;

    /// The most recent adoption of the animal by adoption date.
    async fn adoption_by_animal(
        &self,
        animal_id: AnimalId,
    ) -> Result<Option<AdoptionRecord>, StorageError>;

    async fn adoption_by_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Option<AdoptionRecord>, StorageError>;

    /// Active or completed records whose next follow-up falls in
    /// `[now, now + days]`, earliest first.
    async fn pending_follow_ups(
        &self,
        days: u32,
        now: OffsetDateTime,
    ) -> Result<Vec<AdoptionRecord>, StorageError>;

    async fn adoption_statistics(
        &self,
        now: OffsetDateTime,
    ) -> Result<AdoptionStatistics, StorageError>;
}
