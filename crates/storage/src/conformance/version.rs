use std::future::Future;

use shelter_core::AnimalStatus;

use super::{make_adoption, make_animal, make_application, seed, step, TestResult, T0};
use crate::{ShelterStorage, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "version",
            "update_returns_incremented_version",
            update_returns_incremented_version(factory).await,
        ),
        TestResult::from_result(
            "version",
            "wrong_expected_version_conflicts",
            wrong_expected_version_conflicts(factory).await,
        ),
        TestResult::from_result(
            "version",
            "sequential_stale_snapshot_conflicts",
            sequential_stale_snapshot_conflicts(factory).await,
        ),
        TestResult::from_result(
            "version",
            "delete_with_stale_version_conflicts",
            delete_with_stale_version_conflicts(factory).await,
        ),
    ]
}

async fn update_returns_incremented_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Ziggy");
    let id = animal.id;
    seed(&storage, vec![animal], vec![], vec![]).await?;

    for expected in 0..3 {
        let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
        let row = storage
            .get_animal_for_update(&mut snap, id)
            .await
            .map_err(step("read"))?;
        let new_version = storage
            .update_animal(&mut snap, row, expected)
            .await
            .map_err(step("update"))?;
        storage.commit_snapshot(snap).await.map_err(step("commit"))?;
        if new_version != expected + 1 {
            return Err(format!(
                "expected version {} after update, got {new_version}",
                expected + 1
            ));
        }
    }

    let stored = storage.get_animal(id).await.map_err(step("get"))?;
    if stored.version != 3 {
        return Err(format!("expected stored version 3, got {}", stored.version));
    }
    Ok(())
}

async fn wrong_expected_version_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Coco");
    seed(&storage, vec![animal.clone()], vec![], vec![]).await?;

    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    let result = storage.update_animal(&mut snap, animal, 7).await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::ConcurrentConflict {
            expected_version: 7,
            ..
        }) => Ok(()),
        Err(e) => Err(format!("expected ConcurrentConflict at 7, got {e}")),
        Ok(v) => Err(format!("update with wrong version succeeded (v{v})")),
    }
}

/// Two snapshots read version 0; the second to commit must fail.
async fn sequential_stale_snapshot_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Loki");
    let id = animal.id;
    seed(&storage, vec![animal], vec![], vec![]).await?;

    let mut first = storage.begin_snapshot().await.map_err(step("begin first"))?;
    let mut second = storage.begin_snapshot().await.map_err(step("begin second"))?;

    let mut a = storage
        .get_animal_for_update(&mut first, id)
        .await
        .map_err(step("first read"))?;
    a.status = AnimalStatus::Adopted;
    storage
        .update_animal(&mut first, a, 0)
        .await
        .map_err(step("first update"))?;
    storage
        .commit_snapshot(first)
        .await
        .map_err(step("first commit"))?;

    let mut b = make_animal("Loki").with_status(AnimalStatus::Reserved);
    b.id = id;
    let outcome = match storage.update_animal(&mut second, b, 0).await {
        Ok(_) => storage.commit_snapshot(second).await,
        Err(e) => {
            let _ = storage.abort_snapshot(second).await;
            Err(e)
        }
    };
    match outcome {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        Err(e) => return Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(()) => return Err("stale snapshot committed".to_string()),
    }

    let stored = storage.get_animal(id).await.map_err(step("get"))?;
    if stored.status != AnimalStatus::Adopted {
        return Err(format!("winner's write lost: status {}", stored.status));
    }
    Ok(())
}

async fn delete_with_stale_version_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Rocky");
    let application = make_application(&animal, "rocky@example.org", T0);
    let adoption = make_adoption(&application, T0);
    seed(&storage, vec![], vec![], vec![adoption.clone()]).await?;

    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    let result = storage.delete_adoption(&mut snap, adoption.id, 3).await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        Err(e) => return Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(()) => return Err("delete with stale version succeeded".to_string()),
    }
    storage
        .get_adoption(adoption.id)
        .await
        .map_err(step("adoption still present"))?;
    Ok(())
}
