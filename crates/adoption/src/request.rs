//! Request payloads as received from an outer layer. Identifiers arrive as
//! strings and are parsed by the workflow.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shelter_core::{AdoptionTerms, ApplicantProfile, PaymentStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateApplicationRequest {
    pub animal_id: String,
    #[serde(flatten)]
    pub profile: ApplicantProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateAdoptionRequest {
    pub application_id: String,
    pub adoption_fee: Decimal,
    pub trial_period: bool,
    pub trial_period_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    pub amount_paid: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_url: Option<String>,
    pub schedule_follow_ups: bool,
    /// Day offsets; empty means the configured defaults.
    pub follow_up_intervals: Vec<u32>,
}

impl CreateAdoptionRequest {
    pub(crate) fn terms(&self, default_intervals: &[u32]) -> AdoptionTerms {
        let follow_up_intervals = if !self.schedule_follow_ups {
            Vec::new()
        } else if self.follow_up_intervals.is_empty() {
            default_intervals.to_vec()
        } else {
            self.follow_up_intervals.clone()
        };
        AdoptionTerms {
            adoption_fee: self.adoption_fee,
            payment_status: self.payment_status,
            amount_paid: self.amount_paid,
            payment_method: self.payment_method.clone().filter(|m| !m.is_empty()),
            trial_period: self.trial_period,
            trial_period_days: self.trial_period_days,
            contract_url: self.contract_url.clone(),
            follow_up_intervals,
        }
    }
}

/// Mark one follow-up of an adoption record as done.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompleteFollowUpRequest {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Application listing. Malformed ids are ignored; unknown statuses, sort
/// keys and dates are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListApplicationsRequest {
    pub animal_id: Option<String>,
    pub status: Option<String>,
    pub applicant_email: Option<String>,
    pub applicant_name: Option<String>,
    pub reviewed_by: Option<String>,
    /// RFC 3339.
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListAdoptionsRequest {
    pub animal_id: Option<String>,
    pub adopter_id: Option<String>,
    pub application_id: Option<String>,
    pub processed_by: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub trial_period: Option<bool>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}
