//! Adoption applications: applicant intake payload and the review state
//! machine `submitted → under_review → {approved | rejected}`,
//! `approved → completed`, with withdrawal allowed while still pending.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::id::{ActorId, AnimalId, ApplicationId};
use crate::transition::{ChangeSet, TransitionError, TransitionPolicy};
use crate::validation::{require_text, ValidationError};

// ──────────────────────────────────────────────
// Status and transition table
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Withdrawn,
    /// Set only by the workflow when an adoption record is created.
    Completed,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
        ApplicationStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
            ApplicationStatus::Completed => "completed",
        }
    }

    /// Still waiting for a reviewer decision.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted | ApplicationStatus::UnderReview
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected | ApplicationStatus::Withdrawn | ApplicationStatus::Completed
        )
    }

    /// Whether a caller-supplied patch may move an application from `self`
    /// to `to` under `policy`.
    ///
    /// `completed` is never reachable this way; see
    /// [`AdoptionApplication::complete`].
    pub fn can_transition_to(self, to: ApplicationStatus, policy: TransitionPolicy) -> bool {
        use ApplicationStatus::*;
        use TransitionPolicy::*;

        match (policy, self, to) {
            (_, _, Completed) => false,
            (_, Submitted | UnderReview, Withdrawn) => true,

            (Strict, Submitted, UnderReview) => true,
            (Strict, UnderReview, UnderReview | Approved | Rejected) => true,
            (Strict, _, _) => false,

            (Permissive, Submitted | UnderReview, UnderReview | Approved | Rejected) => true,
            (Permissive, Approved, Approved) | (Permissive, Rejected, Rejected) => true,
            (Permissive, _, _) => false,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("unknown application status '{s}'"))
    }
}

// ──────────────────────────────────────────────
// Applicant payload
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HousingType {
    #[default]
    House,
    Apartment,
    Condo,
    Farm,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipStatus {
    #[default]
    Owned,
    Rented,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_of_birth: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employer: Option<String>,
}

impl ApplicantInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub street: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HousingInfo {
    #[serde(rename = "type")]
    pub housing_type: HousingType,
    pub ownership: OwnershipStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landlord_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landlord_phone: Option<String>,
    #[serde(default)]
    pub landlord_approval: bool,
    #[serde(default)]
    pub has_yard: bool,
    #[serde(default)]
    pub yard_fenced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yard_size: Option<String>,
    #[serde(default)]
    pub allows_pets: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_deposit: Option<rust_decimal::Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMember {
    pub name: String,
    pub age: u32,
    pub relationship: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentPet {
    pub species: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    pub age: u32,
    pub name: String,
    #[serde(default)]
    pub spayed: bool,
    #[serde(default)]
    pub vaccinated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vet_phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub contacted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Everything an applicant fills in. Echoed verbatim onto the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub applicant: ApplicantInfo,
    pub address: AddressInfo,
    pub housing: HousingInfo,
    pub household_size: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub household_members: Vec<HouseholdMember>,
    #[serde(default)]
    pub has_children: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children_ages: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub current_pets: Vec<CurrentPet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_pets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_experience: Option<String>,
    #[serde(default)]
    pub surrendered_pets: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surrender_reason: Option<String>,
    pub reason_for_adoption: String,
    /// Where the pet will live (indoor/outdoor).
    pub pet_location: String,
    /// Hours per day the pet will be alone.
    #[serde(default)]
    pub alone_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prepared_for: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub has_veterinarian: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vet_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vet_address: Option<String>,
    #[serde(default)]
    pub agrees_to_home_visit: bool,
    #[serde(default)]
    pub agrees_to_follow_up: bool,
    #[serde(default)]
    pub agrees_to_return_policy: bool,
    #[serde(default)]
    pub understands_commitment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl ApplicantProfile {
    /// Required-field presence only; no business judgement of the answers.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("applicant.first_name", &self.applicant.first_name)?;
        require_text("applicant.last_name", &self.applicant.last_name)?;
        require_text("applicant.email", &self.applicant.email)?;
        if self.household_size < 1 {
            return Err(ValidationError::OutOfRange {
                field: "household_size",
                constraint: "at least 1",
            });
        }
        require_text("reason_for_adoption", &self.reason_for_adoption)?;
        require_text("pet_location", &self.pet_location)?;
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Application entity
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdoptionApplication {
    pub id: ApplicationId,
    pub animal_id: AnimalId,
    #[serde(flatten)]
    pub profile: ApplicantProfile,

    pub status: ApplicationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub application_date: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub review_date: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub approval_date: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub rejection_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<ActorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub home_visit_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_visit_notes: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub interview_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_notes: Option<String>,

    pub created_by: ActorId,
    pub updated_by: ActorId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub version: i64,
}

/// Partial update applied by a reviewer. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub home_visit_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_visit_notes: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub interview_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_notes: Option<String>,
}

impl AdoptionApplication {
    /// A freshly submitted application.
    pub fn submit(
        animal_id: AnimalId,
        profile: ApplicantProfile,
        created_by: ActorId,
        now: OffsetDateTime,
    ) -> Self {
        AdoptionApplication {
            id: ApplicationId::new(),
            animal_id,
            profile,
            status: ApplicationStatus::Submitted,
            application_date: now,
            review_date: None,
            approval_date: None,
            rejection_date: None,
            rejection_reason: None,
            reviewed_by: None,
            review_notes: None,
            home_visit_date: None,
            home_visit_notes: None,
            interview_date: None,
            interview_notes: None,
            created_by,
            updated_by: created_by,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == ApplicationStatus::Approved
    }

    pub fn is_rejected(&self) -> bool {
        self.status == ApplicationStatus::Rejected
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    pub fn can_be_reviewed(&self) -> bool {
        self.status.is_pending()
    }

    /// Apply a reviewer patch.
    ///
    /// The status change is validated before anything is written, so a
    /// refused transition leaves the application untouched. Entering
    /// `under_review`, `approved` or `rejected` stamps the matching dates;
    /// re-entering a state re-stamps them.
    pub fn apply_patch(
        &mut self,
        patch: &ApplicationPatch,
        actor: ActorId,
        now: OffsetDateTime,
        policy: TransitionPolicy,
    ) -> Result<ChangeSet, TransitionError> {
        if let Some(to) = patch.status {
            if !self.status.can_transition_to(to, policy) {
                return Err(TransitionError::new("application", self.status, to));
            }
        }

        let mut changes = ChangeSet::new();

        if let Some(to) = patch.status {
            changes.record("status", &to);
            self.status = to;
            match to {
                ApplicationStatus::UnderReview => {
                    self.review_date = Some(now);
                }
                ApplicationStatus::Approved => {
                    self.approval_date = Some(now);
                    self.review_date = Some(now);
                }
                ApplicationStatus::Rejected => {
                    self.rejection_date = Some(now);
                    self.review_date = Some(now);
                }
                _ => {}
            }
        }

        if let Some(notes) = &patch.review_notes {
            changes.record("review_notes", notes);
            self.review_notes = Some(notes.clone());
            self.reviewed_by = Some(actor);
        }
        if let Some(reason) = &patch.rejection_reason {
            changes.record("rejection_reason", reason);
            self.rejection_reason = Some(reason.clone());
        }
        if let Some(date) = patch.home_visit_date {
            changes.record("home_visit_date", &date.unix_timestamp());
            self.home_visit_date = Some(date);
        }
        if let Some(notes) = &patch.home_visit_notes {
            changes.record("home_visit_notes", notes);
            self.home_visit_notes = Some(notes.clone());
        }
        if let Some(date) = patch.interview_date {
            changes.record("interview_date", &date.unix_timestamp());
            self.interview_date = Some(date);
        }
        if let Some(notes) = &patch.interview_notes {
            changes.record("interview_notes", notes);
            self.interview_notes = Some(notes.clone());
        }

        self.updated_by = actor;
        self.updated_at = now;
        Ok(changes)
    }

    /// Engine-only `approved → completed`, fired when an adoption record is
    /// created from this application.
    pub fn complete(&mut self, actor: ActorId, now: OffsetDateTime) -> Result<(), TransitionError> {
        if self.status != ApplicationStatus::Approved {
            return Err(TransitionError::new(
                "application",
                self.status,
                ApplicationStatus::Completed,
            ));
        }
        self.status = ApplicationStatus::Completed;
        self.updated_by = actor;
        self.updated_at = now;
        Ok(())
    }
}
