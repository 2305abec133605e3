//! Adoption records: the finalized adoption created from an approved
//! application, with payment, trial period, contract, follow-up and return
//! bookkeeping.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::application::AdoptionApplication;
use crate::id::{ActorId, AdoptionId, AnimalId, ApplicationId};
use crate::transition::{ChangeSet, TransitionError, TransitionPolicy};
use crate::validation::ValidationError;

// ──────────────────────────────────────────────
// Status axes
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdoptionStatus {
    #[default]
    Active,
    Completed,
    Returned,
    Cancelled,
}

impl AdoptionStatus {
    pub const ALL: [AdoptionStatus; 4] = [
        AdoptionStatus::Active,
        AdoptionStatus::Completed,
        AdoptionStatus::Returned,
        AdoptionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdoptionStatus::Active => "active",
            AdoptionStatus::Completed => "completed",
            AdoptionStatus::Returned => "returned",
            AdoptionStatus::Cancelled => "cancelled",
        }
    }

    /// `active → {completed, returned, cancelled}`, `completed → returned`.
    /// Permissive mode also accepts re-entering the current state.
    pub fn can_transition_to(self, to: AdoptionStatus, policy: TransitionPolicy) -> bool {
        use AdoptionStatus::*;

        match (self, to) {
            (Active, Completed | Returned | Cancelled) => true,
            (Completed, Returned) => true,
            (from, to) if from == to => policy == TransitionPolicy::Permissive,
            _ => false,
        }
    }
}

impl fmt::Display for AdoptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdoptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdoptionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("unknown adoption status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Partial,
    Paid,
    Waived,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::Partial,
        PaymentStatus::Paid,
        PaymentStatus::Waived,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Waived => "waived",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("unknown payment status '{s}'"))
    }
}

// ──────────────────────────────────────────────
// Follow-ups and contract
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpKind {
    Phone,
    Email,
    Visit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_date: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_date: Option<OffsetDateTime>,
    #[serde(rename = "type")]
    pub kind: FollowUpKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<ActorId>,
}

impl FollowUp {
    pub fn is_completed(&self) -> bool {
        self.completed_date.is_some()
    }
}

/// Why a follow-up could not be marked done.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FollowUpError {
    #[error("follow-up {index} does not exist (record has {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("follow-up {index} is already completed")]
    AlreadyCompleted { index: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdoptionContract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_url: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub signed_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<String>,
}

// ──────────────────────────────────────────────
// Adoption record
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdoptionRecord {
    pub id: AdoptionId,
    pub application_id: ApplicationId,
    pub animal_id: AnimalId,
    pub adopter_id: ActorId,

    pub status: AdoptionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub adoption_date: OffsetDateTime,
    pub trial_period: bool,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub trial_end_date: Option<OffsetDateTime>,

    pub adoption_fee: Decimal,
    pub payment_status: PaymentStatus,
    pub amount_paid: Decimal,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,

    #[serde(default)]
    pub contract: AdoptionContract,
    #[serde(default)]
    pub agrees_to_return_policy: bool,
    #[serde(default)]
    pub agrees_to_follow_up: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_ups: Vec<FollowUp>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_follow_up_date: Option<OffsetDateTime>,

    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub return_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub processed_by: ActorId,
    pub created_by: ActorId,
    pub updated_by: ActorId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub version: i64,
}

/// Financial, trial, contract and follow-up parameters for a new adoption.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdoptionTerms {
    pub adoption_fee: Decimal,
    pub payment_status: Option<PaymentStatus>,
    pub amount_paid: Decimal,
    pub payment_method: Option<String>,
    pub trial_period: bool,
    pub trial_period_days: u32,
    pub contract_url: Option<String>,
    /// Day offsets from the adoption instant; empty means no follow-ups.
    pub follow_up_intervals: Vec<u32>,
}

/// Upper bound for trial lengths and follow-up offsets, in days.
pub const MAX_SCHEDULE_DAYS: u32 = 3650;

impl AdoptionTerms {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.adoption_fee.is_sign_negative() {
            return Err(ValidationError::OutOfRange {
                field: "adoption_fee",
                constraint: "non-negative",
            });
        }
        if self.amount_paid.is_sign_negative() {
            return Err(ValidationError::OutOfRange {
                field: "amount_paid",
                constraint: "non-negative",
            });
        }
        if self.trial_period_days > MAX_SCHEDULE_DAYS {
            return Err(ValidationError::OutOfRange {
                field: "trial_period_days",
                constraint: "at most 3650",
            });
        }
        if self
            .follow_up_intervals
            .iter()
            .any(|days| *days > MAX_SCHEDULE_DAYS)
        {
            return Err(ValidationError::OutOfRange {
                field: "follow_up_intervals",
                constraint: "at most 3650",
            });
        }
        Ok(())
    }
}

/// Partial update for payment, contract and return bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdoptionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AdoptionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_paid: Option<Decimal>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(
        default,
        alias = "contract_signed",
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub contract_signed_date: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub return_date: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdoptionPatchError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// What a patch changed, and whether it moved the record into `returned`.
/// A repeated return leaves `returned` false.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub changes: ChangeSet,
    pub returned: bool,
}

/// `now` shifted forward by whole days.
pub fn days_after(now: OffsetDateTime, days: u32) -> OffsetDateTime {
    now + Duration::days(i64::from(days))
}

impl AdoptionRecord {
    /// Build the record for an approved application. The caller is
    /// responsible for checking approval and uniqueness first.
    pub fn from_application(
        application: &AdoptionApplication,
        terms: &AdoptionTerms,
        processed_by: ActorId,
        now: OffsetDateTime,
    ) -> Self {
        let mut record = AdoptionRecord {
            id: AdoptionId::new(),
            application_id: application.id,
            animal_id: application.animal_id,
            adopter_id: processed_by,
            status: AdoptionStatus::Active,
            adoption_date: now,
            trial_period: terms.trial_period,
            trial_end_date: None,
            adoption_fee: terms.adoption_fee,
            payment_status: terms.payment_status.unwrap_or_default(),
            amount_paid: terms.amount_paid,
            payment_date: None,
            payment_method: terms.payment_method.clone(),
            receipt_number: None,
            contract: AdoptionContract {
                contract_url: terms.contract_url.clone().filter(|url| !url.is_empty()),
                ..AdoptionContract::default()
            },
            agrees_to_return_policy: application.profile.agrees_to_return_policy,
            agrees_to_follow_up: application.profile.agrees_to_follow_up,
            follow_ups: Vec::new(),
            next_follow_up_date: None,
            return_date: None,
            return_reason: None,
            return_notes: None,
            notes: None,
            processed_by,
            created_by: processed_by,
            updated_by: processed_by,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        if terms.trial_period && terms.trial_period_days > 0 {
            record.trial_end_date = Some(days_after(now, terms.trial_period_days));
        }
        record.schedule_follow_ups(&terms.follow_up_intervals, now);
        record
    }

    /// Active means neither returned nor cancelled.
    pub fn is_active(&self) -> bool {
        !matches!(
            self.status,
            AdoptionStatus::Returned | AdoptionStatus::Cancelled
        )
    }

    pub fn is_completed(&self) -> bool {
        self.status == AdoptionStatus::Completed
    }

    pub fn is_returned(&self) -> bool {
        self.status == AdoptionStatus::Returned
    }

    /// Paid in full or fee waived.
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status,
            PaymentStatus::Paid | PaymentStatus::Waived
        )
    }

    pub fn is_in_trial_period(&self, now: OffsetDateTime) -> bool {
        match (self.trial_period, self.trial_end_date) {
            (true, Some(end)) => now < end,
            _ => false,
        }
    }

    /// Append one `visit` follow-up per day offset and refresh the next
    /// follow-up date.
    pub fn schedule_follow_ups(&mut self, intervals: &[u32], now: OffsetDateTime) {
        for days in intervals {
            self.follow_ups.push(FollowUp {
                scheduled_date: days_after(now, *days),
                completed_date: None,
                kind: FollowUpKind::Visit,
                notes: None,
                completed_by: None,
            });
        }
        self.refresh_next_follow_up(now);
    }

    /// Earliest follow-up that is neither completed nor already past.
    pub fn refresh_next_follow_up(&mut self, now: OffsetDateTime) {
        self.next_follow_up_date = self
            .follow_ups
            .iter()
            .filter(|f| !f.is_completed() && f.scheduled_date >= now)
            .map(|f| f.scheduled_date)
            .min();
    }

    pub fn complete_follow_up(
        &mut self,
        index: usize,
        notes: Option<String>,
        actor: ActorId,
        now: OffsetDateTime,
    ) -> Result<(), FollowUpError> {
        let len = self.follow_ups.len();
        let follow_up = self
            .follow_ups
            .get_mut(index)
            .ok_or(FollowUpError::OutOfRange { index, len })?;
        if follow_up.is_completed() {
            return Err(FollowUpError::AlreadyCompleted { index });
        }
        follow_up.completed_date = Some(now);
        follow_up.completed_by = Some(actor);
        if notes.is_some() {
            follow_up.notes = notes;
        }
        self.refresh_next_follow_up(now);
        self.updated_by = actor;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a bookkeeping patch. Validation happens before any field is
    /// written.
    pub fn apply_patch(
        &mut self,
        patch: &AdoptionPatch,
        actor: ActorId,
        now: OffsetDateTime,
        policy: TransitionPolicy,
    ) -> Result<PatchOutcome, AdoptionPatchError> {
        if let Some(to) = patch.status {
            if !self.status.can_transition_to(to, policy) {
                return Err(TransitionError::new("adoption", self.status, to).into());
            }
        }
        if patch.amount_paid.is_some_and(|a| a.is_sign_negative()) {
            return Err(ValidationError::OutOfRange {
                field: "amount_paid",
                constraint: "non-negative",
            }
            .into());
        }

        let mut changes = ChangeSet::new();
        let returned = patch.status == Some(AdoptionStatus::Returned) && !self.is_returned();

        if let Some(to) = patch.status {
            changes.record("status", &to);
            self.status = to;
        }
        if let Some(payment_status) = patch.payment_status {
            changes.record("payment_status", &payment_status);
            self.payment_status = payment_status;
        }
        if let Some(amount) = patch.amount_paid {
            changes.record("amount_paid", &amount);
            self.amount_paid = amount;
        }
        if let Some(date) = patch.payment_date {
            changes.record("payment_date", &date.unix_timestamp());
            self.payment_date = Some(date);
        }
        if let Some(method) = &patch.payment_method {
            changes.record("payment_method", method);
            self.payment_method = Some(method.clone());
        }
        if let Some(date) = patch.contract_signed_date {
            changes.record("contract_signed_date", &date.unix_timestamp());
            self.contract.signed_date = Some(date);
        }
        if let Some(date) = patch.return_date {
            changes.record("return_date", &date.unix_timestamp());
            self.return_date = Some(date);
        } else if returned && self.return_date.is_none() {
            changes.record("return_date", &now.unix_timestamp());
            self.return_date = Some(now);
        }
        if let Some(reason) = &patch.return_reason {
            changes.record("return_reason", reason);
            self.return_reason = Some(reason.clone());
        }
        if let Some(notes) = &patch.return_notes {
            changes.record("return_notes", notes);
            self.return_notes = Some(notes.clone());
        }
        if let Some(notes) = &patch.notes {
            changes.record("notes", notes);
            self.notes = Some(notes.clone());
        }

        self.updated_by = actor;
        self.updated_at = now;
        Ok(PatchOutcome { changes, returned })
    }
}
