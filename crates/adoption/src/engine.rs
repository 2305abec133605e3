//! The adoption workflow engine.
//!
//! Every mutating operation runs inside one storage snapshot: the entity
//! writes of an operation become visible together on commit, or the
//! snapshot is aborted and nothing is persisted. Audit entries are queued
//! on the outbox only after a successful commit.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use shelter_core::{
    ActorId, AdoptionApplication, AdoptionId, AdoptionPatch, AdoptionRecord, AdoptionTerms,
    AnimalId, ApplicationId, ApplicationPatch, ApplicationStatus, ChangeSet,
};
use shelter_storage::{
    AdoptionFilter, AdoptionStatistics, ApplicationFilter, EntityKind, Page, ShelterStorage,
    StorageError,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::audit::{entity, AuditAction, AuditEntry};
use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::outbox::AuditOutbox;
use crate::request::{
    CompleteFollowUpRequest, CreateAdoptionRequest, CreateApplicationRequest,
    ListAdoptionsRequest, ListApplicationsRequest,
};

/// Source of "now" for every timestamp the engine writes.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

pub struct AdoptionWorkflow<S> {
    storage: Arc<S>,
    outbox: AuditOutbox,
    config: WorkflowConfig,
    clock: Clock,
}

impl<S> Clone for AdoptionWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            outbox: self.outbox.clone(),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S> fmt::Debug for AdoptionWorkflow<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdoptionWorkflow")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: ShelterStorage> AdoptionWorkflow<S> {
    pub fn new(storage: Arc<S>, outbox: AuditOutbox, config: WorkflowConfig) -> Self {
        Self {
            storage,
            outbox,
            config,
            clock: Arc::new(OffsetDateTime::now_utc),
        }
    }

    /// Replace the wall clock, e.g. with a fixed instant in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Wait until every audit entry queued so far has been handled.
    pub async fn flush_audit(&self) {
        self.outbox.flush().await;
    }

    fn now(&self) -> OffsetDateTime {
        (self.clock)()
    }

    // ── Snapshot plumbing ─────────────────────────────────────────────────────

    /// Commit the snapshot if staging succeeded, abort it otherwise.
    async fn settle<T>(&self, snapshot: S::Snapshot, staged: Result<T>) -> Result<T> {
        match staged {
            Ok(value) => {
                self.storage.commit_snapshot(snapshot).await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = self.storage.abort_snapshot(snapshot).await {
                    tracing::warn!(error = %abort, "snapshot abort failed");
                }
                Err(e)
            }
        }
    }

    fn audit(
        &self,
        actor: ActorId,
        action: AuditAction,
        entity_type: &str,
        entity_id: impl fmt::Display,
        changes: ChangeSet,
        at: OffsetDateTime,
    ) {
        self.outbox
            .enqueue(AuditEntry::new(actor, action, entity_type, entity_id, at).with_changes(changes));
    }

    // ── Applications ──────────────────────────────────────────────────────────

    /// Submit an application for an animal that is currently `available`.
    #[tracing::instrument(skip_all, fields(animal_id = %req.animal_id, actor = %actor))]
    pub async fn create_application(
        &self,
        req: CreateApplicationRequest,
        actor: ActorId,
    ) -> Result<AdoptionApplication> {
        let animal_id = AnimalId::parse(&req.animal_id)?;
        req.profile.validate()?;

        let animal = self.storage.get_animal(animal_id).await?;
        if !animal.is_available() {
            return Err(WorkflowError::AnimalNotAvailable);
        }

        let now = self.now();
        let application = AdoptionApplication::submit(animal_id, req.profile, actor, now);

        let mut snapshot = self.storage.begin_snapshot().await?;
        let staged = self
            .storage
            .insert_application(&mut snapshot, application.clone())
            .await
            .map_err(WorkflowError::from);
        self.settle(snapshot, staged).await?;

        tracing::info!(application_id = %application.id, "application submitted");
        self.audit(
            actor,
            AuditAction::Create,
            entity::APPLICATION,
            application.id,
            ChangeSet::new(),
            now,
        );
        Ok(application)
    }

    pub async fn get_application(&self, id: &str) -> Result<AdoptionApplication> {
        let id = ApplicationId::parse(id)?;
        Ok(self.storage.get_application(id).await?)
    }

    /// Apply a reviewer patch. Illegal status moves are refused before
    /// anything is written.
    #[tracing::instrument(skip(self, patch), fields(actor = %actor))]
    pub async fn update_application(
        &self,
        id: &str,
        patch: ApplicationPatch,
        actor: ActorId,
    ) -> Result<AdoptionApplication> {
        let id = ApplicationId::parse(id)?;
        let now = self.now();

        let mut snapshot = self.storage.begin_snapshot().await?;
        let staged = self
            .stage_application_patch(&mut snapshot, id, &patch, actor, now)
            .await;
        let (application, changes) = self.settle(snapshot, staged).await?;

        tracing::info!(
            application_id = %application.id,
            status = %application.status,
            version = application.version,
            "application updated"
        );
        tracing::debug!(fields = ?changes.fields().collect::<Vec<_>>(), "application patch");
        self.audit(
            actor,
            AuditAction::Update,
            entity::APPLICATION,
            application.id,
            changes,
            now,
        );
        Ok(application)
    }

    async fn stage_application_patch(
        &self,
        snapshot: &mut S::Snapshot,
        id: ApplicationId,
        patch: &ApplicationPatch,
        actor: ActorId,
        now: OffsetDateTime,
    ) -> Result<(AdoptionApplication, ChangeSet)> {
        let mut application = self.storage.get_application_for_update(snapshot, id).await?;
        let expected = application.version;
        let changes = application.apply_patch(patch, actor, now, self.config.transition_policy)?;
        application.version = self
            .storage
            .update_application(snapshot, application.clone(), expected)
            .await?;
        Ok((application, changes))
    }

    #[tracing::instrument(skip(self), fields(actor = %actor))]
    pub async fn delete_application(&self, id: &str, actor: ActorId) -> Result<()> {
        let id = ApplicationId::parse(id)?;
        let now = self.now();

        let mut snapshot = self.storage.begin_snapshot().await?;
        let staged = async {
            let application = self
                .storage
                .get_application_for_update(&mut snapshot, id)
                .await?;
            self.storage
                .delete_application(&mut snapshot, id, application.version)
                .await?;
            Ok::<_, WorkflowError>(())
        }
        .await;
        self.settle(snapshot, staged).await?;

        tracing::info!(application_id = %id, "application deleted");
        self.audit(
            actor,
            AuditAction::Delete,
            entity::APPLICATION,
            id,
            ChangeSet::new(),
            now,
        );
        Ok(())
    }

    pub async fn list_applications(
        &self,
        req: &ListApplicationsRequest,
    ) -> Result<Page<AdoptionApplication>> {
        let filter = ApplicationFilter {
            animal_id: lenient_id(req.animal_id.as_deref()),
            status: parse_query(req.status.as_deref())?,
            applicant_email: non_blank(req.applicant_email.as_deref()).map(str::to_string),
            applicant_name: non_blank(req.applicant_name.as_deref()).map(str::to_string),
            reviewed_by: lenient_id(req.reviewed_by.as_deref()),
            date_from: parse_date("from_date", req.from_date.as_deref())?,
            date_to: parse_date("to_date", req.to_date.as_deref())?,
            offset: req.offset.unwrap_or(0),
            limit: self.config.page_limit(req.limit),
            sort_by: parse_query(req.sort_by.as_deref())?.unwrap_or_default(),
            sort_order: parse_query(req.sort_order.as_deref())?.unwrap_or_default(),
        };
        Ok(self.storage.list_applications(&filter).await?)
    }

    /// Every application for the animal, newest first.
    pub async fn applications_by_animal(
        &self,
        animal_id: &str,
    ) -> Result<Vec<AdoptionApplication>> {
        let animal_id = AnimalId::parse(animal_id)?;
        Ok(self.storage.applications_by_animal(animal_id).await?)
    }

    /// Applications still waiting for review, oldest first.
    pub async fn pending_applications(&self) -> Result<Vec<AdoptionApplication>> {
        Ok(self.storage.pending_applications().await?)
    }

    // ── Adoption records ──────────────────────────────────────────────────────

    /// Finalize an approved application.
    ///
    /// Checks run in a fixed order and the first failure wins: application
    /// exists, application is approved, no record references it yet. The
    /// record insert, `approved → completed` on the application and
    /// `available → adopted` on the animal then commit together.
    #[tracing::instrument(skip_all, fields(application_id = %req.application_id, actor = %actor))]
    pub async fn create_adoption(
        &self,
        req: CreateAdoptionRequest,
        actor: ActorId,
    ) -> Result<AdoptionRecord> {
        let application_id = ApplicationId::parse(&req.application_id)?;
        let terms = req.terms(&self.config.default_follow_up_intervals);
        terms.validate()?;
        let now = self.now();

        let mut snapshot = self.storage.begin_snapshot().await?;
        let staged = self
            .stage_adoption(&mut snapshot, application_id, &terms, actor, now)
            .await;
        let record = self.settle(snapshot, staged).await?;

        tracing::info!(
            adoption_id = %record.id,
            animal_id = %record.animal_id,
            follow_ups = record.follow_ups.len(),
            "adoption created"
        );
        self.audit(
            actor,
            AuditAction::Create,
            entity::ADOPTION,
            record.id,
            ChangeSet::new(),
            now,
        );
        Ok(record)
    }

    async fn stage_adoption(
        &self,
        snapshot: &mut S::Snapshot,
        application_id: ApplicationId,
        terms: &AdoptionTerms,
        actor: ActorId,
        now: OffsetDateTime,
    ) -> Result<AdoptionRecord> {
        let mut application = self
            .storage
            .get_application_for_update(snapshot, application_id)
            .await?;
        // A completed application already went through here; let the
        // duplicate check below report it.
        let completed = application.status == ApplicationStatus::Completed;
        if !application.is_approved() && !completed {
            return Err(WorkflowError::ApplicationNotApproved);
        }
        if self
            .storage
            .find_adoption_by_application_for_update(snapshot, application_id)
            .await?
            .is_some()
        {
            return Err(WorkflowError::AdoptionExists);
        }
        if completed {
            return Err(WorkflowError::ApplicationNotApproved);
        }

        let record = AdoptionRecord::from_application(&application, terms, actor, now);
        self.storage.insert_adoption(snapshot, record.clone()).await?;

        let expected = application.version;
        application.complete(actor, now)?;
        self.storage
            .update_application(snapshot, application, expected)
            .await?;

        let mut animal = self
            .storage
            .get_animal_for_update(snapshot, record.animal_id)
            .await?;
        let expected = animal.version;
        animal.mark_adopted(now)?;
        self.storage.update_animal(snapshot, animal, expected).await?;

        Ok(record)
    }

    pub async fn get_adoption(&self, id: &str) -> Result<AdoptionRecord> {
        let id = AdoptionId::parse(id)?;
        Ok(self.storage.get_adoption(id).await?)
    }

    /// Apply a bookkeeping patch. Setting `returned` puts the animal back
    /// to `available` in the same snapshot.
    #[tracing::instrument(skip(self, patch), fields(actor = %actor))]
    pub async fn update_adoption(
        &self,
        id: &str,
        patch: AdoptionPatch,
        actor: ActorId,
    ) -> Result<AdoptionRecord> {
        let id = AdoptionId::parse(id)?;
        let now = self.now();

        let mut snapshot = self.storage.begin_snapshot().await?;
        let staged = self
            .stage_adoption_patch(&mut snapshot, id, &patch, actor, now)
            .await;
        let (record, changes) = self.settle(snapshot, staged).await?;

        tracing::info!(
            adoption_id = %record.id,
            status = %record.status,
            version = record.version,
            "adoption updated"
        );
        tracing::debug!(fields = ?changes.fields().collect::<Vec<_>>(), "adoption patch");
        self.audit(
            actor,
            AuditAction::Update,
            entity::ADOPTION,
            record.id,
            changes,
            now,
        );
        Ok(record)
    }

    async fn stage_adoption_patch(
        &self,
        snapshot: &mut S::Snapshot,
        id: AdoptionId,
        patch: &AdoptionPatch,
        actor: ActorId,
        now: OffsetDateTime,
    ) -> Result<(AdoptionRecord, ChangeSet)> {
        let mut record = self.storage.get_adoption_for_update(snapshot, id).await?;
        let expected = record.version;
        let outcome = record.apply_patch(patch, actor, now, self.config.transition_policy)?;
        record.version = self
            .storage
            .update_adoption(snapshot, record.clone(), expected)
            .await?;

        if outcome.returned && !self.animal_held_elsewhere(&record).await? {
            let mut animal = self
                .storage
                .get_animal_for_update(snapshot, record.animal_id)
                .await?;
            let expected = animal.version;
            animal.mark_returned(now);
            self.storage.update_animal(snapshot, animal, expected).await?;
        }
        Ok((record, outcome.changes))
    }

    /// Whether a different, still active adoption claims `record`'s animal.
    /// Returning a superseded record must not free that animal.
    async fn animal_held_elsewhere(&self, record: &AdoptionRecord) -> Result<bool> {
        let held = self
            .storage
            .adoption_by_animal(record.animal_id)
            .await?
            .is_some_and(|latest| latest.id != record.id && latest.is_active());
        if held {
            tracing::warn!(
                adoption_id = %record.id,
                animal_id = %record.animal_id,
                "animal held by a newer adoption, leaving its status untouched"
            );
        }
        Ok(held)
    }

    #[tracing::instrument(skip(self), fields(actor = %actor))]
    pub async fn delete_adoption(&self, id: &str, actor: ActorId) -> Result<()> {
        let id = AdoptionId::parse(id)?;
        let now = self.now();

        let mut snapshot = self.storage.begin_snapshot().await?;
        let staged = async {
            let record = self.storage.get_adoption_for_update(&mut snapshot, id).await?;
            self.storage
                .delete_adoption(&mut snapshot, id, record.version)
                .await?;
            Ok::<_, WorkflowError>(())
        }
        .await;
        self.settle(snapshot, staged).await?;

        tracing::info!(adoption_id = %id, "adoption deleted");
        self.audit(
            actor,
            AuditAction::Delete,
            entity::ADOPTION,
            id,
            ChangeSet::new(),
            now,
        );
        Ok(())
    }

    /// Mark one scheduled follow-up as done and move `next_follow_up_date`.
    #[tracing::instrument(skip(self, req), fields(index = req.index, actor = %actor))]
    pub async fn complete_follow_up(
        &self,
        adoption_id: &str,
        req: CompleteFollowUpRequest,
        actor: ActorId,
    ) -> Result<AdoptionRecord> {
        let id = AdoptionId::parse(adoption_id)?;
        let CompleteFollowUpRequest { index, notes } = req;
        let now = self.now();

        let mut snapshot = self.storage.begin_snapshot().await?;
        let staged = async {
            let mut record = self.storage.get_adoption_for_update(&mut snapshot, id).await?;
            let expected = record.version;
            record.complete_follow_up(index, notes, actor, now)?;
            record.version = self
                .storage
                .update_adoption(&mut snapshot, record.clone(), expected)
                .await?;
            Ok::<_, WorkflowError>(record)
        }
        .await;
        let record = self.settle(snapshot, staged).await?;

        tracing::info!(adoption_id = %record.id, index, "follow-up completed");
        let mut changes = ChangeSet::new();
        changes.record("follow_up_completed", &index);
        changes.record(
            "next_follow_up_date",
            &record.next_follow_up_date.map(|d| d.unix_timestamp()),
        );
        self.audit(
            actor,
            AuditAction::Update,
            entity::ADOPTION,
            record.id,
            changes,
            now,
        );
        Ok(record)
    }

    pub async fn list_adoptions(&self, req: &ListAdoptionsRequest) -> Result<Page<AdoptionRecord>> {
        let filter = AdoptionFilter {
            animal_id: lenient_id(req.animal_id.as_deref()),
            adopter_id: lenient_id(req.adopter_id.as_deref()),
            application_id: lenient_id(req.application_id.as_deref()),
            status: parse_query(req.status.as_deref())?,
            payment_status: parse_query(req.payment_status.as_deref())?,
            trial_period: req.trial_period,
            processed_by: lenient_id(req.processed_by.as_deref()),
            date_from: parse_date("from_date", req.from_date.as_deref())?,
            date_to: parse_date("to_date", req.to_date.as_deref())?,
            offset: req.offset.unwrap_or(0),
            limit: self.config.page_limit(req.limit),
            sort_by: parse_query(req.sort_by.as_deref())?.unwrap_or_default(),
            sort_order: parse_query(req.sort_order.as_deref())?.unwrap_or_default(),
        };
        Ok(self.storage.list_adoptions(&filter).await?)
    }

    /// The animal's most recent adoption.
    pub async fn adoption_by_animal(&self, animal_id: &str) -> Result<AdoptionRecord> {
        let animal_id = AnimalId::parse(animal_id)?;
        self.storage
            .adoption_by_animal(animal_id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityKind::Adoption, animal_id).into())
    }

    pub async fn adoption_by_application(&self, application_id: &str) -> Result<AdoptionRecord> {
        let application_id = ApplicationId::parse(application_id)?;
        self.storage
            .adoption_by_application(application_id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityKind::Adoption, application_id).into())
    }

    /// Active or completed adoptions with a follow-up due in the next
    /// `days` days, soonest first.
    pub async fn pending_follow_ups(&self, days: i64) -> Result<Vec<AdoptionRecord>> {
        let days = u32::try_from(days)
            .map_err(|_| WorkflowError::InvalidQuery(format!("invalid days '{days}'")))?;
        Ok(self.storage.pending_follow_ups(days, self.now()).await?)
    }

    pub async fn adoption_statistics(&self) -> Result<AdoptionStatistics> {
        Ok(self.storage.adoption_statistics(self.now()).await?)
    }
}

// ── Query parsing ────────────────────────────────────────────────────────────

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Filter ids that do not parse are dropped rather than rejected.
fn lenient_id<T: FromStr>(raw: Option<&str>) -> Option<T> {
    non_blank(raw).and_then(|s| s.parse().ok())
}

fn parse_query<T>(raw: Option<&str>) -> Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    non_blank(raw)
        .map(str::parse)
        .transpose()
        .map_err(WorkflowError::InvalidQuery)
}

fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<OffsetDateTime>> {
    non_blank(raw)
        .map(|s| OffsetDateTime::parse(s, &Rfc3339))
        .transpose()
        .map_err(|_| WorkflowError::InvalidQuery(format!("invalid {field}, expected RFC 3339")))
}
