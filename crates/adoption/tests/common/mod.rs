#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shelter_adoption::{
    AdoptionWorkflow, AuditOutbox, Clock, CreateAdoptionRequest, CreateApplicationRequest,
    MemoryAuditSink, WorkflowConfig,
};
use shelter_core::{
    ActorId, AddressInfo, AdoptionApplication, AdoptionId, AdoptionRecord, Animal, AnimalId,
    ApplicantInfo, ApplicantProfile, ApplicationId, ApplicationPatch, ApplicationStatus,
};
use shelter_storage::{
    AdoptionFilter, AdoptionStatistics, ApplicationFilter, MemorySnapshot, MemoryStorage, Page,
    ShelterStorage, StorageError,
};
use time::macros::datetime;
use time::OffsetDateTime;

pub const T0: OffsetDateTime = datetime!(2026-03-01 10:00 UTC);

pub fn fixed_clock(at: OffsetDateTime) -> Clock {
    Arc::new(move || at)
}

pub fn fast_config() -> WorkflowConfig {
    let mut config = WorkflowConfig::default();
    config.audit.retry_backoff_ms = 1;
    config
}

/// A workflow over `storage` with a fixed clock and an in-memory audit log.
pub fn workflow_over<S: ShelterStorage>(
    storage: Arc<S>,
    config: WorkflowConfig,
) -> (AdoptionWorkflow<S>, MemoryAuditSink) {
    let sink = MemoryAuditSink::new();
    let (outbox, _task) = AuditOutbox::spawn(sink.clone(), config.audit.clone());
    let workflow = AdoptionWorkflow::new(storage, outbox, config).with_clock(fixed_clock(T0));
    (workflow, sink)
}

pub fn profile(email: &str) -> ApplicantProfile {
    ApplicantProfile {
        applicant: ApplicantInfo {
            first_name: "Maja".into(),
            last_name: "Kowalska".into(),
            email: email.into(),
            phone: "+48 500 100 200".into(),
            ..ApplicantInfo::default()
        },
        address: AddressInfo {
            street: "Długa 5".into(),
            city: "Gdańsk".into(),
            state: None,
            zip_code: "80-001".into(),
            country: "PL".into(),
        },
        household_size: 3,
        reason_for_adoption: "family dog".into(),
        pet_location: "indoor".into(),
        agrees_to_follow_up: true,
        agrees_to_return_policy: true,
        ..ApplicantProfile::default()
    }
}

pub fn application_request(animal_id: AnimalId, email: &str) -> CreateApplicationRequest {
    CreateApplicationRequest {
        animal_id: animal_id.to_string(),
        profile: profile(email),
    }
}

pub fn adoption_request(application_id: ApplicationId) -> CreateAdoptionRequest {
    CreateAdoptionRequest {
        application_id: application_id.to_string(),
        adoption_fee: Decimal::new(150, 0),
        ..CreateAdoptionRequest::default()
    }
}

/// Submit an application for `animal` and approve it.
pub async fn approved_application<S: ShelterStorage>(
    workflow: &AdoptionWorkflow<S>,
    animal: AnimalId,
    email: &str,
    staff: ActorId,
) -> AdoptionApplication {
    let application = workflow
        .create_application(application_request(animal, email), staff)
        .await
        .unwrap();
    workflow
        .update_application(
            &application.id.to_string(),
            ApplicationPatch {
                status: Some(ApplicationStatus::Approved),
                ..ApplicationPatch::default()
            },
            staff,
        )
        .await
        .unwrap()
}

pub fn available_animal(name: &str) -> Animal {
    Animal::new(name, "dog", T0 - time::Duration::days(30))
}

// ── Fault injection ──────────────────────────────────────────────────────────

/// Which in-snapshot write `FaultyStorage` refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    UpdateAnimal,
    UpdateApplication,
    Commit,
}

/// Delegates to `MemoryStorage` and fails one kind of write while armed.
pub struct FaultyStorage {
    pub inner: MemoryStorage,
    fault: Fault,
    armed: AtomicBool,
}

impl FaultyStorage {
    pub fn new(inner: MemoryStorage, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    fn trip(&self, at: Fault) -> Result<(), StorageError> {
        if self.fault == at && self.armed.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("injected failure at {at:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ShelterStorage for FaultyStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        self.inner.begin_snapshot().await
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        self.trip(Fault::Commit)?;
        self.inner.commit_snapshot(snapshot).await
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        self.inner.abort_snapshot(snapshot).await
    }

    async fn insert_animal(
        &self,
        snapshot: &mut MemorySnapshot,
        animal: Animal,
    ) -> Result<(), StorageError> {
        self.inner.insert_animal(snapshot, animal).await
    }

    async fn get_animal_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        id: AnimalId,
    ) -> Result<Animal, StorageError> {
        self.inner.get_animal_for_update(snapshot, id).await
    }

    async fn update_animal(
        &self,
        snapshot: &mut MemorySnapshot,
        animal: Animal,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        self.trip(Fault::UpdateAnimal)?;
        self.inner
            .update_animal(snapshot, animal, expected_version)
            .await
    }

    async fn insert_application(
        &self,
        snapshot: &mut MemorySnapshot,
        application: AdoptionApplication,
    ) -> Result<(), StorageError> {
        self.inner.insert_application(snapshot, application).await
    }

    async fn get_application_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        id: ApplicationId,
    ) -> Result<AdoptionApplication, StorageError> {
        self.inner.get_application_for_update(snapshot, id).await
    }

    async fn update_application(
        &self,
        snapshot: &mut MemorySnapshot,
        application: AdoptionApplication,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        self.trip(Fault::UpdateApplication)?;
        self.inner
            .update_application(snapshot, application, expected_version)
            .await
    }

    async fn delete_application(
        &self,
        snapshot: &mut MemorySnapshot,
        id: ApplicationId,
        expected_version: i64,
    ) -> Result<(), StorageError> {
        self.inner
            .delete_application(snapshot, id, expected_version)
            .await
    }

    async fn insert_adoption(
        &self,
        snapshot: &mut MemorySnapshot,
        record: AdoptionRecord,
    ) -> Result<(), StorageError> {
        self.inner.insert_adoption(snapshot, record).await
    }

    async fn get_adoption_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        id: AdoptionId,
    ) -> Result<AdoptionRecord, StorageError> {
        self.inner.get_adoption_for_update(snapshot, id).await
    }

    async fn find_adoption_by_application_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        application_id: ApplicationId,
    ) -> Result<Option<AdoptionRecord>, StorageError> {
        self.inner
            .find_adoption_by_application_for_update(snapshot, application_id)
            .await
    }

    async fn update_adoption(
        &self,
        snapshot: &mut MemorySnapshot,
        record: AdoptionRecord,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        self.inner
            .update_adoption(snapshot, record, expected_version)
            .await
    }

    async fn delete_adoption(
        &self,
        snapshot: &mut MemorySnapshot,
        id: AdoptionId,
        expected_version: i64,
    ) -> Result<(), StorageError> {
        self.inner
            .delete_adoption(snapshot, id, expected_version)
            .await
    }

    async fn get_animal(&self, id: AnimalId) -> Result<Animal, StorageError> {
        self.inner.get_animal(id).await
    }

    async fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<AdoptionApplication, StorageError> {
        self.inner.get_application(id).await
    }

    async fn get_adoption(&self, id: AdoptionId) -> Result<AdoptionRecord, StorageError> {
        self.inner.get_adoption(id).await
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Page<AdoptionApplication>, StorageError> {
        self.inner.list_applications(filter).await
    }

    async fn list_adoptions(
        &self,
        filter: &AdoptionFilter,
    ) -> Result<Page<AdoptionRecord>, StorageError> {
        self.inner.list_adoptions(filter).await
    }

    async fn applications_by_animal(
        &self,
        animal_id: AnimalId,
    ) -> Result<Vec<AdoptionApplication>, StorageError> {
        self.inner.applications_by_animal(animal_id).await
    }

    async fn pending_applications(&self) -> Result<Vec<AdoptionApplication>, StorageError> {
        self.inner.pending_applications().await
    }

    async fn adoption_by_animal(
        &self,
        animal_id: AnimalId,
    ) -> Result<Option<AdoptionRecord>, StorageError> {
        self.inner.adoption_by_animal(animal_id).await
    }

    async fn adoption_by_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Option<AdoptionRecord>, StorageError> {
        self.inner.adoption_by_application(application_id).await
    }

    async fn pending_follow_ups(
        &self,
        days: u32,
        now: OffsetDateTime,
    ) -> Result<Vec<AdoptionRecord>, StorageError> {
        self.inner.pending_follow_ups(days, now).await
    }

    async fn adoption_statistics(
        &self,
        now: OffsetDateTime,
    ) -> Result<AdoptionStatistics, StorageError> {
        self.inner.adoption_statistics(now).await
    }
}
