mod common;

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shelter_adoption::{
    AdoptionWorkflow, AuditAction, AuditEntry, AuditError, AuditOutbox, AuditSink,
    CompleteFollowUpRequest, ErrorKind, ListAdoptionsRequest, ListApplicationsRequest,
    WorkflowConfig, WorkflowError,
};
use shelter_core::{
    ActorId, AdoptionPatch, AdoptionStatus, AnimalStatus, ApplicationPatch, ApplicationStatus,
    FollowUpKind, PaymentStatus, TransitionPolicy,
};
use shelter_storage::{MemoryStorage, ShelterStorage};
use time::Duration;

use common::*;

fn patch_status(status: ApplicationStatus) -> ApplicationPatch {
    ApplicationPatch {
        status: Some(status),
        ..ApplicationPatch::default()
    }
}

// ── Intake ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn application_starts_submitted_and_echoes_the_payload() {
    let animal = available_animal("Rex");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, audit) = workflow_over(storage, fast_config());
    let staff = ActorId::new();

    let application = workflow
        .create_application(application_request(animal.id, "maja@example.org"), staff)
        .await
        .unwrap();

    assert_eq!(application.status, ApplicationStatus::Submitted);
    assert_eq!(application.animal_id, animal.id);
    assert_eq!(application.application_date, T0);
    assert_eq!(application.profile, profile("maja@example.org"));

    let fetched = workflow
        .get_application(&application.id.to_string())
        .await
        .unwrap();
    assert_eq!(fetched, application);

    workflow.flush_audit().await;
    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Create);
    assert_eq!(entries[0].entity_type, "adoption_application");
    assert_eq!(entries[0].entity_id, application.id.to_string());
    assert_eq!(entries[0].actor, staff);
}

#[tokio::test]
async fn application_for_adopted_animal_is_rejected() {
    let animal = available_animal("Bella").with_status(AnimalStatus::Adopted);
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage, fast_config());

    let err = workflow
        .create_application(application_request(animal.id, "x@example.org"), ActorId::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "animal is not available for adoption");
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let applications = workflow
        .applications_by_animal(&animal.id.to_string())
        .await
        .unwrap();
    assert!(applications.is_empty());
}

#[tokio::test]
async fn every_non_available_status_blocks_intake() {
    for status in [
        AnimalStatus::Reserved,
        AnimalStatus::Pending,
        AnimalStatus::Adopted,
        AnimalStatus::Fostered,
        AnimalStatus::UnderTreatment,
        AnimalStatus::Quarantine,
        AnimalStatus::Unavailable,
        AnimalStatus::Deceased,
        AnimalStatus::Transferred,
    ] {
        let animal = available_animal("Blocked").with_status(status);
        let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
        let (workflow, _) = workflow_over(storage, fast_config());
        let err = workflow
            .create_application(application_request(animal.id, "b@example.org"), ActorId::new())
            .await
            .unwrap_err();
        assert!(
            matches!(err, WorkflowError::AnimalNotAvailable),
            "status {status}: {err}"
        );
    }
}

#[tokio::test]
async fn intake_rejects_bad_ids_unknown_animals_and_missing_fields() {
    let animal = available_animal("Rex");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage, fast_config());
    let staff = ActorId::new();

    let mut req = application_request(animal.id, "a@example.org");
    req.animal_id = "not-an-id".into();
    let err = workflow.create_application(req, staff).await.unwrap_err();
    assert_eq!(err.to_string(), "invalid animal ID");
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let err = workflow
        .create_application(
            application_request(shelter_core::AnimalId::new(), "a@example.org"),
            staff,
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "animal not found");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut req = application_request(animal.id, "");
    req.profile.applicant.email = "  ".into();
    let err = workflow.create_application(req, staff).await.unwrap_err();
    assert_eq!(err.to_string(), "applicant.email is required");

    let mut req = application_request(animal.id, "a@example.org");
    req.profile.household_size = 0;
    let err = workflow.create_application(req, staff).await.unwrap_err();
    assert_eq!(err.to_string(), "household_size must be at least 1");
}

// ── Review ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn review_stamps_dates_and_reviewer() {
    let animal = available_animal("Rex");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, audit) = workflow_over(storage, fast_config());
    let staff = ActorId::new();
    let application = workflow
        .create_application(application_request(animal.id, "r@example.org"), staff)
        .await
        .unwrap();
    let id = application.id.to_string();

    let reviewing = workflow
        .update_application(
            &id,
            ApplicationPatch {
                status: Some(ApplicationStatus::UnderReview),
                review_notes: Some("references check out".into()),
                ..ApplicationPatch::default()
            },
            staff,
        )
        .await
        .unwrap();
    assert_eq!(reviewing.status, ApplicationStatus::UnderReview);
    assert_eq!(reviewing.review_date, Some(T0));
    assert_eq!(reviewing.reviewed_by, Some(staff));
    assert_eq!(reviewing.version, 1);

    let rejected = workflow
        .update_application(
            &id,
            ApplicationPatch {
                status: Some(ApplicationStatus::Rejected),
                rejection_reason: Some("no fenced yard".into()),
                ..ApplicationPatch::default()
            },
            staff,
        )
        .await
        .unwrap();
    assert!(rejected.is_rejected());
    assert_eq!(rejected.rejection_date, Some(T0));
    assert_eq!(rejected.version, 2);

    workflow.flush_audit().await;
    let updates: Vec<_> = audit
        .entries()
        .into_iter()
        .filter(|e| e.action == AuditAction::Update)
        .collect();
    assert_eq!(updates.len(), 2);
    assert!(updates[0].changes.contains("status"));
    assert!(updates[0].changes.contains("review_notes"));
    assert!(updates[1].changes.contains("rejection_reason"));
}

#[tokio::test]
async fn callers_cannot_set_completed_or_leave_terminal_states() {
    let animal = available_animal("Rex");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage, fast_config());
    let staff = ActorId::new();
    let application = workflow
        .create_application(application_request(animal.id, "t@example.org"), staff)
        .await
        .unwrap();
    let id = application.id.to_string();

    let err = workflow
        .update_application(&id, patch_status(ApplicationStatus::Completed), staff)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Transition(_)));
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    workflow
        .update_application(&id, patch_status(ApplicationStatus::Rejected), staff)
        .await
        .unwrap();
    let err = workflow
        .update_application(&id, patch_status(ApplicationStatus::Approved), staff)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "illegal application status transition from 'rejected' to 'approved'"
    );

    let stored = workflow.get_application(&id).await.unwrap();
    assert_eq!(stored.status, ApplicationStatus::Rejected);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn strict_policy_refuses_reapproval() {
    let animal = available_animal("Rex");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let config = WorkflowConfig {
        transition_policy: TransitionPolicy::Strict,
        ..fast_config()
    };
    let (workflow, _) = workflow_over(storage, config);
    let staff = ActorId::new();
    let application = workflow
        .create_application(application_request(animal.id, "s@example.org"), staff)
        .await
        .unwrap();
    let id = application.id.to_string();

    let err = workflow
        .update_application(&id, patch_status(ApplicationStatus::Approved), staff)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Transition(_)));

    workflow
        .update_application(&id, patch_status(ApplicationStatus::UnderReview), staff)
        .await
        .unwrap();
    workflow
        .update_application(&id, patch_status(ApplicationStatus::Approved), staff)
        .await
        .unwrap();
    let err = workflow
        .update_application(&id, patch_status(ApplicationStatus::Approved), staff)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Transition(_)));
}

// ── Adoption creation ────────────────────────────────────────────────────────

#[tokio::test]
async fn approved_application_becomes_an_adoption() {
    let animal = available_animal("Luna");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, audit) = workflow_over(storage.clone(), fast_config());
    let staff = ActorId::new();
    let application = approved_application(&workflow, animal.id, "luna@example.org", staff).await;

    let mut req = adoption_request(application.id);
    req.trial_period = true;
    req.trial_period_days = 14;
    req.schedule_follow_ups = true;
    req.follow_up_intervals = vec![7, 30];
    let record = workflow.create_adoption(req, staff).await.unwrap();

    assert_eq!(record.animal_id, animal.id);
    assert_eq!(record.application_id, application.id);
    assert_eq!(record.status, AdoptionStatus::Active);
    assert_eq!(record.adoption_fee, Decimal::new(150, 0));
    assert_eq!(record.payment_status, PaymentStatus::Pending);
    assert_eq!(record.trial_end_date, Some(T0 + Duration::days(14)));
    assert!(record.is_in_trial_period(T0 + Duration::days(13)));
    let dates: Vec<_> = record.follow_ups.iter().map(|f| f.scheduled_date).collect();
    assert_eq!(dates, vec![T0 + Duration::days(7), T0 + Duration::days(30)]);
    assert!(record.follow_ups.iter().all(|f| f.kind == FollowUpKind::Visit));
    assert_eq!(record.next_follow_up_date, Some(T0 + Duration::days(7)));

    let application = workflow
        .get_application(&application.id.to_string())
        .await
        .unwrap();
    assert_eq!(application.status, ApplicationStatus::Completed);
    let animal = storage.get_animal(animal.id).await.unwrap();
    assert_eq!(animal.status, AnimalStatus::Adopted);
    assert_eq!(animal.version, 1);

    let stored = workflow.get_adoption(&record.id.to_string()).await.unwrap();
    assert_eq!(stored.id, record.id);

    workflow.flush_audit().await;
    let last = audit.entries().pop().unwrap();
    assert_eq!(last.action, AuditAction::Create);
    assert_eq!(last.entity_type, "adoption");
    assert_eq!(last.entity_id, record.id.to_string());
}

#[tokio::test]
async fn default_intervals_schedule_three_visits() {
    let animal = available_animal("Milo");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage, fast_config());
    let staff = ActorId::new();
    let application = approved_application(&workflow, animal.id, "milo@example.org", staff).await;

    let mut req = adoption_request(application.id);
    req.schedule_follow_ups = true;
    let record = workflow.create_adoption(req, staff).await.unwrap();

    let offsets: Vec<_> = record
        .follow_ups
        .iter()
        .map(|f| (f.scheduled_date - T0).whole_days())
        .collect();
    assert_eq!(offsets, vec![7, 30, 90]);
    assert!(record.follow_ups.iter().all(|f| f.kind == FollowUpKind::Visit));
    assert_eq!(record.trial_end_date, None);
}

#[tokio::test]
async fn second_adoption_for_the_same_application_is_rejected() {
    let animal = available_animal("Luna");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage, fast_config());
    let staff = ActorId::new();
    let application = approved_application(&workflow, animal.id, "dup@example.org", staff).await;

    workflow
        .create_adoption(adoption_request(application.id), staff)
        .await
        .unwrap();
    let err = workflow
        .create_adoption(adoption_request(application.id), staff)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "adoption already exists for this application");
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let page = workflow
        .list_adoptions(&ListAdoptionsRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn adoption_requires_an_approved_application() {
    let animal = available_animal("Rex");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage.clone(), fast_config());
    let staff = ActorId::new();
    let application = workflow
        .create_application(application_request(animal.id, "early@example.org"), staff)
        .await
        .unwrap();

    for status in [None, Some(ApplicationStatus::UnderReview)] {
        if let Some(status) = status {
            workflow
                .update_application(&application.id.to_string(), patch_status(status), staff)
                .await
                .unwrap();
        }
        let err = workflow
            .create_adoption(adoption_request(application.id), staff)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "application must be approved before creating adoption"
        );
    }

    assert_eq!(
        storage.get_animal(animal.id).await.unwrap().status,
        AnimalStatus::Available
    );
}

#[tokio::test]
async fn adoption_input_is_validated_before_lookup() {
    let storage = Arc::new(MemoryStorage::new());
    let (workflow, _) = workflow_over(storage, fast_config());
    let staff = ActorId::new();

    let mut req = adoption_request(shelter_core::ApplicationId::new());
    req.application_id = "garbage".into();
    let err = workflow.create_adoption(req, staff).await.unwrap_err();
    assert_eq!(err.to_string(), "invalid application ID");

    let mut req = adoption_request(shelter_core::ApplicationId::new());
    req.adoption_fee = Decimal::new(-5, 0);
    let err = workflow.create_adoption(req, staff).await.unwrap_err();
    assert_eq!(err.to_string(), "adoption_fee must be non-negative");

    let err = workflow
        .create_adoption(adoption_request(shelter_core::ApplicationId::new()), staff)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "application not found");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn second_approved_application_loses_the_animal() {
    let animal = available_animal("Shared");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage.clone(), fast_config());
    let staff = ActorId::new();
    let first = approved_application(&workflow, animal.id, "first@example.org", staff).await;
    let second = approved_application(&workflow, animal.id, "second@example.org", staff).await;

    workflow
        .create_adoption(adoption_request(first.id), staff)
        .await
        .unwrap();
    let err = workflow
        .create_adoption(adoption_request(second.id), staff)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AnimalTaken(_)), "{err}");
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let second = workflow
        .get_application(&second.id.to_string())
        .await
        .unwrap();
    assert_eq!(second.status, ApplicationStatus::Approved);
    assert!(workflow
        .adoption_by_application(&second.id.to_string())
        .await
        .is_err());
}

// ── Adoption bookkeeping ─────────────────────────────────────────────────────

#[tokio::test]
async fn returning_an_adoption_frees_the_animal() {
    let animal = available_animal("Boomerang");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage.clone(), fast_config());
    let staff = ActorId::new();
    let application = approved_application(&workflow, animal.id, "ret@example.org", staff).await;
    let record = workflow
        .create_adoption(adoption_request(application.id), staff)
        .await
        .unwrap();

    let returned = workflow
        .update_adoption(
            &record.id.to_string(),
            AdoptionPatch {
                status: Some(AdoptionStatus::Returned),
                return_reason: Some("allergies".into()),
                ..AdoptionPatch::default()
            },
            staff,
        )
        .await
        .unwrap();

    assert!(returned.is_returned());
    assert!(!returned.is_active());
    assert_eq!(returned.return_date, Some(T0));
    assert_eq!(returned.return_reason.as_deref(), Some("allergies"));
    assert_eq!(returned.version, 1);
    assert_eq!(
        storage.get_animal(animal.id).await.unwrap().status,
        AnimalStatus::Available
    );
}

fn return_patch() -> AdoptionPatch {
    AdoptionPatch {
        status: Some(AdoptionStatus::Returned),
        ..AdoptionPatch::default()
    }
}

#[tokio::test]
async fn returning_a_returned_adoption_keeps_the_new_adopter() {
    let animal = available_animal("Twice");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage.clone(), fast_config());
    let staff = ActorId::new();

    let first = approved_application(&workflow, animal.id, "first@example.org", staff).await;
    let r1 = workflow
        .create_adoption(adoption_request(first.id), staff)
        .await
        .unwrap();
    workflow
        .update_adoption(&r1.id.to_string(), return_patch(), staff)
        .await
        .unwrap();

    let later = workflow
        .clone()
        .with_clock(fixed_clock(T0 + Duration::days(30)));
    let second = approved_application(&later, animal.id, "second@example.org", staff).await;
    let r2 = later
        .create_adoption(adoption_request(second.id), staff)
        .await
        .unwrap();

    let again = later
        .update_adoption(&r1.id.to_string(), return_patch(), staff)
        .await
        .unwrap();
    assert!(again.is_returned());
    assert_eq!(again.return_date, Some(T0));

    assert_eq!(
        storage.get_animal(animal.id).await.unwrap().status,
        AnimalStatus::Adopted
    );
    assert!(storage.get_adoption(r2.id).await.unwrap().is_active());

    let err = later
        .create_application(
            application_request(animal.id, "third@example.org"),
            staff,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn returning_a_superseded_adoption_leaves_the_animal_adopted() {
    let animal = available_animal("Relisted");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage.clone(), fast_config());
    let staff = ActorId::new();

    let first = approved_application(&workflow, animal.id, "old@example.org", staff).await;
    let r1 = workflow
        .create_adoption(adoption_request(first.id), staff)
        .await
        .unwrap();

    // The registry relists the animal while r1 is still open.
    let mut snapshot = storage.begin_snapshot().await.unwrap();
    let listed = storage
        .get_animal_for_update(&mut snapshot, animal.id)
        .await
        .unwrap();
    let version = listed.version;
    storage
        .update_animal(
            &mut snapshot,
            listed.with_status(AnimalStatus::Available),
            version,
        )
        .await
        .unwrap();
    storage.commit_snapshot(snapshot).await.unwrap();

    let later = workflow
        .clone()
        .with_clock(fixed_clock(T0 + Duration::days(30)));
    let second = approved_application(&later, animal.id, "new@example.org", staff).await;
    let r2 = later
        .create_adoption(adoption_request(second.id), staff)
        .await
        .unwrap();

    let returned = later
        .update_adoption(&r1.id.to_string(), return_patch(), staff)
        .await
        .unwrap();
    assert!(returned.is_returned());
    assert_eq!(
        storage.get_animal(animal.id).await.unwrap().status,
        AnimalStatus::Adopted
    );
    assert!(storage.get_adoption(r2.id).await.unwrap().is_active());
}

#[tokio::test]
async fn payment_updates_leave_the_animal_alone() {
    let animal = available_animal("Paid");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, audit) = workflow_over(storage.clone(), fast_config());
    let staff = ActorId::new();
    let application = approved_application(&workflow, animal.id, "pay@example.org", staff).await;
    let record = workflow
        .create_adoption(adoption_request(application.id), staff)
        .await
        .unwrap();

    let paid = workflow
        .update_adoption(
            &record.id.to_string(),
            AdoptionPatch {
                payment_status: Some(PaymentStatus::Paid),
                amount_paid: Some(Decimal::new(150, 0)),
                payment_method: Some("card".into()),
                ..AdoptionPatch::default()
            },
            staff,
        )
        .await
        .unwrap();
    assert!(paid.is_paid());
    assert_eq!(paid.status, AdoptionStatus::Active);
    assert_eq!(
        storage.get_animal(animal.id).await.unwrap().status,
        AnimalStatus::Adopted
    );

    let err = workflow
        .update_adoption(
            &record.id.to_string(),
            AdoptionPatch {
                amount_paid: Some(Decimal::new(-1, 0)),
                ..AdoptionPatch::default()
            },
            staff,
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "amount_paid must be non-negative");

    workflow.flush_audit().await;
    let update = audit
        .entries()
        .into_iter()
        .find(|e| e.action == AuditAction::Update && e.entity_type == "adoption")
        .unwrap();
    assert!(update.changes.contains("payment_status"));
    assert!(update.changes.contains("amount_paid"));
}

#[tokio::test]
async fn cancelled_adoption_cannot_be_reopened() {
    let animal = available_animal("Nope");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage, fast_config());
    let staff = ActorId::new();
    let application = approved_application(&workflow, animal.id, "c@example.org", staff).await;
    let record = workflow
        .create_adoption(adoption_request(application.id), staff)
        .await
        .unwrap();
    let id = record.id.to_string();

    let status = |s| AdoptionPatch {
        status: Some(s),
        ..AdoptionPatch::default()
    };
    workflow
        .update_adoption(&id, status(AdoptionStatus::Cancelled), staff)
        .await
        .unwrap();
    let err = workflow
        .update_adoption(&id, status(AdoptionStatus::Active), staff)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Transition(_)));
}

#[tokio::test]
async fn completing_follow_ups_moves_the_next_date() {
    let animal = available_animal("Check");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, audit) = workflow_over(storage, fast_config());
    let staff = ActorId::new();
    let application = approved_application(&workflow, animal.id, "f@example.org", staff).await;
    let mut req = adoption_request(application.id);
    req.schedule_follow_ups = true;
    let record = workflow.create_adoption(req, staff).await.unwrap();
    let id = record.id.to_string();

    let done = workflow
        .complete_follow_up(
            &id,
            CompleteFollowUpRequest {
                index: 0,
                notes: Some("settled in well".into()),
            },
            staff,
        )
        .await
        .unwrap();
    assert_eq!(done.follow_ups[0].completed_date, Some(T0));
    assert_eq!(done.follow_ups[0].completed_by, Some(staff));
    assert_eq!(done.next_follow_up_date, Some(T0 + Duration::days(30)));

    let err = workflow
        .complete_follow_up(
            &id,
            CompleteFollowUpRequest {
                index: 0,
                notes: None,
            },
            staff,
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "follow-up 0 is already completed");

    let err = workflow
        .complete_follow_up(
            &id,
            CompleteFollowUpRequest {
                index: 9,
                notes: None,
            },
            staff,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    workflow.flush_audit().await;
    let last = audit.entries().pop().unwrap();
    assert_eq!(last.action, AuditAction::Update);
    assert!(last.changes.contains("follow_up_completed"));
}

#[tokio::test]
async fn deletes_are_audited_and_final() {
    let animal = available_animal("Gone");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, audit) = workflow_over(storage, fast_config());
    let staff = ActorId::new();
    let application = approved_application(&workflow, animal.id, "d@example.org", staff).await;
    let record = workflow
        .create_adoption(adoption_request(application.id), staff)
        .await
        .unwrap();

    workflow
        .delete_adoption(&record.id.to_string(), staff)
        .await
        .unwrap();
    workflow
        .delete_application(&application.id.to_string(), staff)
        .await
        .unwrap();

    let err = workflow
        .get_adoption(&record.id.to_string())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "adoption not found");
    let err = workflow
        .delete_application(&application.id.to_string(), staff)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    workflow.flush_audit().await;
    let deletes: Vec<_> = audit
        .entries()
        .into_iter()
        .filter(|e| e.action == AuditAction::Delete)
        .map(|e| e.entity_type)
        .collect();
    assert_eq!(deletes, vec!["adoption", "adoption_application"]);
}

// ── Queries ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_applications_filters_and_pages() {
    let rex = available_animal("Rex");
    let tom = available_animal("Tom");
    let storage = Arc::new(MemoryStorage::with_animals([rex.clone(), tom.clone()]));
    let (workflow, _) = workflow_over(storage, fast_config());
    let staff = ActorId::new();
    for email in ["a@example.org", "b@example.org", "c@example.org"] {
        workflow
            .create_application(application_request(rex.id, email), staff)
            .await
            .unwrap();
    }
    let other = approved_application(&workflow, tom.id, "tom@example.org", staff).await;

    let page = workflow
        .list_applications(&ListApplicationsRequest {
            animal_id: Some(rex.id.to_string()),
            limit: Some(2),
            ..ListApplicationsRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);

    let page = workflow
        .list_applications(&ListApplicationsRequest {
            status: Some("approved".into()),
            animal_id: Some("not-a-uuid".into()),
            ..ListApplicationsRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, other.id);

    let page = workflow
        .list_applications(&ListApplicationsRequest {
            applicant_email: Some("B@EXAMPLE.ORG".into()),
            ..ListApplicationsRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let err = workflow
        .list_applications(&ListApplicationsRequest {
            status: Some("lost".into()),
            ..ListApplicationsRequest::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let pending = workflow.pending_applications().await.unwrap();
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|a| a.status == ApplicationStatus::Submitted));
}

#[tokio::test]
async fn adoption_lookups_and_follow_up_window() {
    let animal = available_animal("Lookup");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let (workflow, _) = workflow_over(storage, fast_config());
    let staff = ActorId::new();
    let application = approved_application(&workflow, animal.id, "l@example.org", staff).await;
    let mut req = adoption_request(application.id);
    req.schedule_follow_ups = true;
    let record = workflow.create_adoption(req, staff).await.unwrap();

    let by_animal = workflow
        .adoption_by_animal(&animal.id.to_string())
        .await
        .unwrap();
    assert_eq!(by_animal.id, record.id);
    let by_application = workflow
        .adoption_by_application(&application.id.to_string())
        .await
        .unwrap();
    assert_eq!(by_application.id, record.id);

    let err = workflow
        .adoption_by_animal(&shelter_core::AnimalId::new().to_string())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "adoption not found");

    assert_eq!(workflow.pending_follow_ups(10).await.unwrap().len(), 1);
    assert!(workflow.pending_follow_ups(3).await.unwrap().is_empty());
    let err = workflow.pending_follow_ups(-1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let page = workflow
        .list_adoptions(&ListAdoptionsRequest {
            status: Some("active".into()),
            trial_period: Some(false),
            ..ListAdoptionsRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    let page = workflow
        .list_adoptions(&ListAdoptionsRequest {
            payment_status: Some("paid".into()),
            ..ListAdoptionsRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn statistics_reflect_committed_adoptions() {
    let rex = available_animal("Rex");
    let tom = available_animal("Tom");
    let storage = Arc::new(MemoryStorage::with_animals([rex.clone(), tom.clone()]));
    let (workflow, _) = workflow_over(storage, fast_config());
    let staff = ActorId::new();

    let first = approved_application(&workflow, rex.id, "1@example.org", staff).await;
    let second = approved_application(&workflow, tom.id, "2@example.org", staff).await;
    workflow
        .create_adoption(adoption_request(first.id), staff)
        .await
        .unwrap();
    let mut req = adoption_request(second.id);
    req.adoption_fee = Decimal::new(50, 0);
    let returned = workflow.create_adoption(req, staff).await.unwrap();
    workflow
        .update_adoption(
            &returned.id.to_string(),
            AdoptionPatch {
                status: Some(AdoptionStatus::Returned),
                ..AdoptionPatch::default()
            },
            staff,
        )
        .await
        .unwrap();

    let stats = workflow.adoption_statistics().await.unwrap();
    assert_eq!(stats.total_adoptions, 2);
    assert_eq!(stats.active_adoptions, 1);
    assert_eq!(stats.returned_adoptions, 1);
    assert_eq!(stats.total_adoption_fees, Decimal::new(200, 0));
    assert_eq!(stats.average_adoption_fee, Decimal::new(100, 0));
    assert_eq!(stats.adoptions_this_month, 2);
    assert!((stats.return_rate - 50.0).abs() < f64::EPSILON);
}

// ── Audit isolation ──────────────────────────────────────────────────────────

struct BrokenSink;

#[async_trait]
impl AuditSink for BrokenSink {
    async fn record(&self, _entry: &AuditEntry) -> Result<(), AuditError> {
        Err(AuditError("disk full".into()))
    }
}

#[tokio::test]
async fn failing_audit_sink_never_fails_the_workflow() {
    let animal = available_animal("Quiet");
    let storage = Arc::new(MemoryStorage::with_animals([animal.clone()]));
    let config = fast_config();
    let (outbox, _task) = AuditOutbox::spawn(BrokenSink, config.audit.clone());
    let workflow =
        AdoptionWorkflow::new(storage.clone(), outbox, config).with_clock(fixed_clock(T0));
    let staff = ActorId::new();

    let application = approved_application(&workflow, animal.id, "q@example.org", staff).await;
    let record = workflow
        .create_adoption(adoption_request(application.id), staff)
        .await
        .unwrap();
    workflow.flush_audit().await;

    assert_eq!(
        storage.get_adoption(record.id).await.unwrap().application_id,
        application.id
    );
}
