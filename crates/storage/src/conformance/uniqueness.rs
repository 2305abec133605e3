use std::future::Future;

use super::{make_adoption, make_animal, make_application, seed, step, TestResult, T0};
use crate::{ShelterStorage, StorageError};

pub(super) async fn run_uniqueness_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "uniqueness",
            "second_adoption_for_committed_application_rejected",
            second_adoption_for_committed_application_rejected(factory).await,
        ),
        TestResult::from_result(
            "uniqueness",
            "second_adoption_in_same_snapshot_rejected",
            second_adoption_in_same_snapshot_rejected(factory).await,
        ),
        TestResult::from_result(
            "uniqueness",
            "racing_snapshots_only_one_adoption_commits",
            racing_snapshots_only_one_adoption_commits(factory).await,
        ),
        TestResult::from_result(
            "uniqueness",
            "find_by_application_sees_staged_insert",
            find_by_application_sees_staged_insert(factory).await,
        ),
    ]
}

fn expect_duplicate(result: Result<(), StorageError>) -> Result<(), String> {
    match result {
        Err(StorageError::DuplicateAdoption { .. }) => Ok(()),
        Err(e) => Err(format!("expected DuplicateAdoption, got {e}")),
        Ok(()) => Err("second adoption for one application was accepted".to_string()),
    }
}

async fn second_adoption_for_committed_application_rejected<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Hazel");
    let application = make_application(&animal, "hazel@example.org", T0);
    seed(
        &storage,
        vec![],
        vec![],
        vec![make_adoption(&application, T0)],
    )
    .await?;

    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    let result = match storage
        .insert_adoption(&mut snap, make_adoption(&application, T0))
        .await
    {
        Ok(()) => storage.commit_snapshot(snap).await,
        Err(e) => {
            let _ = storage.abort_snapshot(snap).await;
            Err(e)
        }
    };
    expect_duplicate(result)
}

async fn second_adoption_in_same_snapshot_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Juniper");
    let application = make_application(&animal, "juniper@example.org", T0);

    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    storage
        .insert_adoption(&mut snap, make_adoption(&application, T0))
        .await
        .map_err(step("first insert"))?;
    let result = match storage
        .insert_adoption(&mut snap, make_adoption(&application, T0))
        .await
    {
        Ok(()) => storage.commit_snapshot(snap).await,
        Err(e) => {
            let _ = storage.abort_snapshot(snap).await;
            Err(e)
        }
    };
    expect_duplicate(result)
}

/// Two snapshots each insert a record for the same application; the
/// constraint must be re-checked at commit.
async fn racing_snapshots_only_one_adoption_commits<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Pixel");
    let application = make_application(&animal, "pixel@example.org", T0);

    let mut first = storage.begin_snapshot().await.map_err(step("begin first"))?;
    let mut second = storage.begin_snapshot().await.map_err(step("begin second"))?;
    storage
        .insert_adoption(&mut first, make_adoption(&application, T0))
        .await
        .map_err(step("first insert"))?;
    let second_insert = storage
        .insert_adoption(&mut second, make_adoption(&application, T0))
        .await;

    storage
        .commit_snapshot(first)
        .await
        .map_err(step("first commit"))?;
    let result = match second_insert {
        Ok(()) => storage.commit_snapshot(second).await,
        Err(e) => {
            let _ = storage.abort_snapshot(second).await;
            Err(e)
        }
    };
    expect_duplicate(result)?;

    let stored = storage
        .adoption_by_application(application.id)
        .await
        .map_err(step("lookup"))?;
    if stored.is_none() {
        return Err("winning adoption missing".to_string());
    }
    Ok(())
}

async fn find_by_application_sees_staged_insert<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Olive");
    let application = make_application(&animal, "olive@example.org", T0);
    let adoption = make_adoption(&application, T0);

    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    let before = storage
        .find_adoption_by_application_for_update(&mut snap, application.id)
        .await
        .map_err(step("find before"))?;
    storage
        .insert_adoption(&mut snap, adoption.clone())
        .await
        .map_err(step("insert"))?;
    let after = storage
        .find_adoption_by_application_for_update(&mut snap, application.id)
        .await
        .map_err(step("find after"))?;
    let _ = storage.abort_snapshot(snap).await;

    if before.is_some() {
        return Err("found an adoption before inserting one".to_string());
    }
    match after {
        Some(found) if found.id == adoption.id => Ok(()),
        Some(found) => Err(format!("found the wrong adoption {}", found.id)),
        None => Err("staged adoption not visible to its own snapshot".to_string()),
    }
}
