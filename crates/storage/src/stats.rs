use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shelter_core::{AdoptionRecord, AdoptionStatus, PaymentStatus};
use time::{OffsetDateTime, UtcOffset};

/// Aggregate view over every adoption record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdoptionStatistics {
    pub total_adoptions: u64,
    pub active_adoptions: u64,
    pub completed_adoptions: u64,
    pub returned_adoptions: u64,
    pub total_adoption_fees: Decimal,
    pub average_adoption_fee: Decimal,
    pub adoptions_this_month: u64,
    pub adoptions_this_year: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_payment_status: BTreeMap<String, u64>,
    /// Records whose next follow-up date has arrived.
    pub pending_follow_ups: u64,
    /// Returned / total, as a percentage.
    pub return_rate: f64,
}

impl AdoptionStatistics {
    /// Compute statistics; month and year boundaries are taken in UTC.
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a AdoptionRecord>,
        now: OffsetDateTime,
    ) -> Self {
        let now = now.to_offset(UtcOffset::UTC);
        let mut stats = AdoptionStatistics::default();
        let mut fees_saturated = false;

        for record in records {
            stats.total_adoptions += 1;
            *stats
                .by_status
                .entry(record.status.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_payment_status
                .entry(record.payment_status.as_str().to_string())
                .or_default() += 1;

            match record.status {
                AdoptionStatus::Active => stats.active_adoptions += 1,
                AdoptionStatus::Completed => stats.completed_adoptions += 1,
                AdoptionStatus::Returned => stats.returned_adoptions += 1,
                AdoptionStatus::Cancelled => {}
            }

            match stats.total_adoption_fees.checked_add(record.adoption_fee) {
                Some(total) => stats.total_adoption_fees = total,
                None if !fees_saturated => {
                    fees_saturated = true;
                    stats.total_adoption_fees = Decimal::MAX;
                    tracing::warn!(
                        adoption_id = %record.id,
                        "adoption fee total exceeds the decimal range, saturating"
                    );
                }
                None => {}
            }

            let adopted = record.adoption_date.to_offset(UtcOffset::UTC);
            if adopted.year() == now.year() {
                stats.adoptions_this_year += 1;
                if adopted.month() == now.month() {
                    stats.adoptions_this_month += 1;
                }
            }

            if record.next_follow_up_date.is_some_and(|next| next <= now) {
                stats.pending_follow_ups += 1;
            }
        }

        if stats.total_adoptions > 0 {
            stats.average_adoption_fee =
                (stats.total_adoption_fees / Decimal::from(stats.total_adoptions)).round_dp(2);
            stats.return_rate =
                stats.returned_adoptions as f64 / stats.total_adoptions as f64 * 100.0;
        }
        stats
    }

    pub fn count_for_status(&self, status: AdoptionStatus) -> u64 {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }

    pub fn count_for_payment(&self, status: PaymentStatus) -> u64 {
        self.by_payment_status
            .get(status.as_str())
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelter_core::{
        ActorId, AdoptionApplication, AdoptionTerms, AnimalId, ApplicantInfo, ApplicantProfile,
        ApplicationStatus,
    };
    use time::macros::datetime;

    fn record(fee: i64, adopted_at: OffsetDateTime, status: AdoptionStatus) -> AdoptionRecord {
        let profile = ApplicantProfile {
            applicant: ApplicantInfo {
                first_name: "Ada".into(),
                last_name: "Byron".into(),
                email: "ada@example.org".into(),
                ..ApplicantInfo::default()
            },
            household_size: 1,
            reason_for_adoption: "company".into(),
            pet_location: "indoors".into(),
            ..ApplicantProfile::default()
        };
        let mut app =
            AdoptionApplication::submit(AnimalId::new(), profile, ActorId::new(), adopted_at);
        app.status = ApplicationStatus::Approved;
        let terms = AdoptionTerms {
            adoption_fee: Decimal::from(fee),
            ..AdoptionTerms::default()
        };
        let mut record = AdoptionRecord::from_application(&app, &terms, ActorId::new(), adopted_at);
        record.status = status;
        record
    }

    #[test]
    fn empty_statistics_are_zero() {
        let stats = AdoptionStatistics::from_records([], datetime!(2026-06-15 12:00 UTC));
        assert_eq!(stats.total_adoptions, 0);
        assert_eq!(stats.average_adoption_fee, Decimal::ZERO);
        assert_eq!(stats.return_rate, 0.0);
    }

    #[test]
    fn counts_fees_periods_and_return_rate() {
        let now = datetime!(2026-06-15 12:00 UTC);
        let records = vec![
            record(100, datetime!(2026-06-01 08:00 UTC), AdoptionStatus::Active),
            record(50, datetime!(2026-02-10 08:00 UTC), AdoptionStatus::Returned),
            record(75, datetime!(2025-12-31 23:00 UTC), AdoptionStatus::Completed),
            record(25, datetime!(2026-06-14 08:00 UTC), AdoptionStatus::Cancelled),
        ];
        let stats = AdoptionStatistics::from_records(&records, now);

        assert_eq!(stats.total_adoptions, 4);
        assert_eq!(stats.active_adoptions, 1);
        assert_eq!(stats.completed_adoptions, 1);
        assert_eq!(stats.returned_adoptions, 1);
        assert_eq!(stats.count_for_status(AdoptionStatus::Cancelled), 1);
        assert_eq!(stats.count_for_payment(PaymentStatus::Pending), 4);
        assert_eq!(stats.total_adoption_fees, Decimal::from(250));
        assert_eq!(stats.average_adoption_fee, Decimal::new(6250, 2));
        assert_eq!(stats.adoptions_this_year, 3);
        assert_eq!(stats.adoptions_this_month, 2);
        assert_eq!(stats.return_rate, 25.0);
    }

    #[test]
    fn fee_total_saturates_instead_of_overflowing() {
        let now = datetime!(2026-06-15 12:00 UTC);
        let mut big = record(0, datetime!(2026-06-01 08:00 UTC), AdoptionStatus::Active);
        big.adoption_fee = Decimal::MAX;
        let records = vec![
            big.clone(),
            big,
            record(10, datetime!(2026-06-02 08:00 UTC), AdoptionStatus::Active),
        ];

        let stats = AdoptionStatistics::from_records(&records, now);
        assert_eq!(stats.total_adoptions, 3);
        assert_eq!(stats.total_adoption_fees, Decimal::MAX);
        assert_eq!(
            stats.average_adoption_fee,
            (Decimal::MAX / Decimal::from(3)).round_dp(2)
        );
    }

    #[test]
    fn pending_follow_ups_counts_due_dates() {
        let now = datetime!(2026-06-15 12:00 UTC);
        let mut due = record(0, datetime!(2026-06-01 08:00 UTC), AdoptionStatus::Active);
        due.next_follow_up_date = Some(datetime!(2026-06-08 08:00 UTC));
        let mut later = record(0, datetime!(2026-06-10 08:00 UTC), AdoptionStatus::Active);
        later.next_follow_up_date = Some(datetime!(2026-07-10 08:00 UTC));
        let none = record(0, datetime!(2026-06-10 08:00 UTC), AdoptionStatus::Active);

        let stats = AdoptionStatistics::from_records(&[due, later, none], now);
        assert_eq!(stats.pending_follow_ups, 1);
    }
}
