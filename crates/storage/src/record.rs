//! Query-side records: list filters, sort keys and result pages.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shelter_core::{
    ActorId, AdoptionApplication, AdoptionRecord, AdoptionStatus, AnimalId, ApplicationId,
    ApplicationStatus, PaymentStatus,
};
use time::OffsetDateTime;

/// One page of a filtered listing. `total` counts matches before paging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    /// Slice an already filtered and sorted list. `limit == 0` means no limit.
    pub fn from_sorted(items: Vec<T>, offset: usize, limit: usize) -> Self {
        let total = items.len();
        let iter = items.into_iter().skip(offset);
        let items = if limit == 0 {
            iter.collect()
        } else {
            iter.take(limit).collect()
        };
        Page { items, total }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

// ── Applications ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationSortField {
    #[default]
    ApplicationDate,
    CreatedAt,
    UpdatedAt,
    Status,
}

impl FromStr for ApplicationSortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "application_date" => Ok(ApplicationSortField::ApplicationDate),
            "created_at" => Ok(ApplicationSortField::CreatedAt),
            "updated_at" => Ok(ApplicationSortField::UpdatedAt),
            "status" => Ok(ApplicationSortField::Status),
            other => Err(format!("unknown application sort field '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationFilter {
    pub animal_id: Option<AnimalId>,
    pub status: Option<ApplicationStatus>,
    /// Exact match, case-insensitive.
    pub applicant_email: Option<String>,
    /// Substring of first, last or full name, case-insensitive.
    pub applicant_name: Option<String>,
    pub reviewed_by: Option<ActorId>,
    pub date_from: Option<OffsetDateTime>,
    pub date_to: Option<OffsetDateTime>,
    pub offset: usize,
    /// Zero means unlimited.
    pub limit: usize,
    pub sort_by: ApplicationSortField,
    pub sort_order: SortOrder,
}

impl ApplicationFilter {
    pub fn matches(&self, app: &AdoptionApplication) -> bool {
        if self.animal_id.is_some_and(|id| id != app.animal_id) {
            return false;
        }
        if self.status.is_some_and(|s| s != app.status) {
            return false;
        }
        if let Some(email) = &self.applicant_email {
            if !app.profile.applicant.email.eq_ignore_ascii_case(email.trim()) {
                return false;
            }
        }
        if let Some(name) = &self.applicant_name {
            let needle = name.trim().to_lowercase();
            let full = app.profile.applicant.full_name().to_lowercase();
            if !full.contains(&needle) {
                return false;
            }
        }
        if self.reviewed_by.is_some() && self.reviewed_by != app.reviewed_by {
            return false;
        }
        in_range(app.application_date, self.date_from, self.date_to)
    }

    pub fn sort(&self, items: &mut [AdoptionApplication]) {
        let field = self.sort_by;
        let order = self.sort_order;
        items.sort_by(|a, b| {
            let primary = match field {
                ApplicationSortField::ApplicationDate => a.application_date.cmp(&b.application_date),
                ApplicationSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                ApplicationSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                ApplicationSortField::Status => a.status.as_str().cmp(b.status.as_str()),
            };
            order.apply(primary.then_with(|| a.id.cmp(&b.id)))
        });
    }
}

// ── Adoptions ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdoptionSortField {
    #[default]
    AdoptionDate,
    CreatedAt,
    UpdatedAt,
    Status,
    AdoptionFee,
}

impl FromStr for AdoptionSortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "adoption_date" => Ok(AdoptionSortField::AdoptionDate),
            "created_at" => Ok(AdoptionSortField::CreatedAt),
            "updated_at" => Ok(AdoptionSortField::UpdatedAt),
            "status" => Ok(AdoptionSortField::Status),
            "adoption_fee" => Ok(AdoptionSortField::AdoptionFee),
            other => Err(format!("unknown adoption sort field '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdoptionFilter {
    pub animal_id: Option<AnimalId>,
    pub adopter_id: Option<ActorId>,
    pub application_id: Option<ApplicationId>,
    pub status: Option<AdoptionStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub trial_period: Option<bool>,
    pub processed_by: Option<ActorId>,
    pub date_from: Option<OffsetDateTime>,
    pub date_to: Option<OffsetDateTime>,
    pub offset: usize,
    /// Zero means unlimited.
    pub limit: usize,
    pub sort_by: AdoptionSortField,
    pub sort_order: SortOrder,
}

impl AdoptionFilter {
    pub fn matches(&self, record: &AdoptionRecord) -> bool {
        self.animal_id.map_or(true, |id| id == record.animal_id)
            && self.adopter_id.map_or(true, |id| id == record.adopter_id)
            && self
                .application_id
                .map_or(true, |id| id == record.application_id)
            && self.status.map_or(true, |s| s == record.status)
            && self
                .payment_status
                .map_or(true, |s| s == record.payment_status)
            && self.trial_period.map_or(true, |t| t == record.trial_period)
            && self.processed_by.map_or(true, |id| id == record.processed_by)
            && in_range(record.adoption_date, self.date_from, self.date_to)
    }

    pub fn sort(&self, items: &mut [AdoptionRecord]) {
        let field = self.sort_by;
        let order = self.sort_order;
        items.sort_by(|a, b| {
            let primary = match field {
                AdoptionSortField::AdoptionDate => a.adoption_date.cmp(&b.adoption_date),
                AdoptionSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                AdoptionSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                AdoptionSortField::Status => a.status.as_str().cmp(b.status.as_str()),
                AdoptionSortField::AdoptionFee => a.adoption_fee.cmp(&b.adoption_fee),
            };
            order.apply(primary.then_with(|| a.id.cmp(&b.id)))
        });
    }
}

fn in_range(
    at: OffsetDateTime,
    from: Option<OffsetDateTime>,
    to: Option<OffsetDateTime>,
) -> bool {
    from.map_or(true, |from| at >= from) && to.map_or(true, |to| at <= to)
}
