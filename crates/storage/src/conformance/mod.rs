//! Conformance test suite for `ShelterStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `ShelterStorage` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Insert**: row creation, version 0, duplicate detection
//! - **Errors**: correct `NotFound` variants for missing rows
//! - **Snapshot isolation**: uncommitted writes invisible, aborted writes discarded
//! - **Atomic commit**: all-or-nothing semantics for multi-entity snapshots
//! - **Version validation / OCC**: stale versions rejected at update or commit
//! - **Uniqueness**: one adoption record per application
//! - **Queries**: filters, paging, follow-up window, statistics
//! - **Concurrency**: racing snapshots produce exactly one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use shelter_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod concurrent;
mod error;
mod insert;
mod query;
mod snapshot;
mod uniqueness;
mod version;

use std::fmt;
use std::future::Future;

use rust_decimal::Decimal;
use serde::Serialize;
use shelter_core::{
    ActorId, AdoptionApplication, AdoptionRecord, AdoptionTerms, Animal, ApplicantInfo,
    ApplicantProfile, ApplicationStatus,
};
use time::macros::datetime;
use time::OffsetDateTime;

use crate::{ShelterStorage, StorageError};

/// Result of a single conformance test.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    /// Test category (e.g. "insert", "snapshot", "commit").
    pub category: String,
    /// Test name (e.g. "insert_starts_at_version_0").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone, Serialize)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(insert::run_insert_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(uniqueness::run_uniqueness_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: fixtures with sensible defaults ─────────────────────────────────

const T0: OffsetDateTime = datetime!(2026-03-01 10:00 UTC);

/// Label a storage error with the step that produced it.
fn step(label: &'static str) -> impl Fn(StorageError) -> String {
    move |e| format!("{label}: {e}")
}

fn make_animal(name: &str) -> Animal {
    Animal::new(name, "dog", T0)
}

fn make_application(animal: &Animal, email: &str, at: OffsetDateTime) -> AdoptionApplication {
    let profile = ApplicantProfile {
        applicant: ApplicantInfo {
            first_name: "Test".to_string(),
            last_name: "Applicant".to_string(),
            email: email.to_string(),
            ..ApplicantInfo::default()
        },
        household_size: 1,
        reason_for_adoption: "companionship".to_string(),
        pet_location: "indoors".to_string(),
        ..ApplicantProfile::default()
    };
    AdoptionApplication::submit(animal.id, profile, ActorId::new(), at)
}

fn make_adoption(application: &AdoptionApplication, at: OffsetDateTime) -> AdoptionRecord {
    let mut approved = application.clone();
    approved.status = ApplicationStatus::Approved;
    let terms = AdoptionTerms {
        adoption_fee: Decimal::from(100),
        ..AdoptionTerms::default()
    };
    AdoptionRecord::from_application(&approved, &terms, ActorId::new(), at)
}

/// Commit the given rows in one snapshot.
async fn seed<S: ShelterStorage>(
    storage: &S,
    animals: Vec<Animal>,
    applications: Vec<AdoptionApplication>,
    adoptions: Vec<AdoptionRecord>,
) -> Result<(), String> {
    let mut snap = storage.begin_snapshot().await.map_err(step("begin seed"))?;
    for animal in animals {
        storage
            .insert_animal(&mut snap, animal)
            .await
            .map_err(step("seed animal"))?;
    }
    for application in applications {
        storage
            .insert_application(&mut snap, application)
            .await
            .map_err(step("seed application"))?;
    }
    for adoption in adoptions {
        storage
            .insert_adoption(&mut snap, adoption)
            .await
            .map_err(step("seed adoption"))?;
    }
    storage
        .commit_snapshot(snap)
        .await
        .map_err(step("commit seed"))
}
