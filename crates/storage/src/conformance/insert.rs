use std::future::Future;

use super::{make_adoption, make_animal, make_application, seed, step, TestResult, T0};
use crate::{ShelterStorage, StorageError};

pub(super) async fn run_insert_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "insert",
            "insert_starts_at_version_0",
            insert_starts_at_version_0(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "insert_round_trips_all_entities",
            insert_round_trips_all_entities(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "duplicate_animal_id_rejected",
            duplicate_animal_id_rejected(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "duplicate_application_id_rejected_in_same_snapshot",
            duplicate_application_id_rejected_in_same_snapshot(factory).await,
        ),
    ]
}

async fn insert_starts_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut animal = make_animal("Rex");
    animal.version = 41;
    let id = animal.id;
    seed(&storage, vec![animal], vec![], vec![]).await?;

    let stored = storage.get_animal(id).await.map_err(step("get"))?;
    if stored.version != 0 {
        return Err(format!("expected version 0, got {}", stored.version));
    }
    Ok(())
}

async fn insert_round_trips_all_entities<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Luna");
    let application = make_application(&animal, "luna@example.org", T0);
    let adoption = make_adoption(&application, T0);
    seed(
        &storage,
        vec![animal.clone()],
        vec![application.clone()],
        vec![adoption.clone()],
    )
    .await?;

    let got_animal = storage.get_animal(animal.id).await.map_err(step("animal"))?;
    if got_animal != animal {
        return Err(format!("animal mismatch: {got_animal:?}"));
    }
    let got_app = storage
        .get_application(application.id)
        .await
        .map_err(step("application"))?;
    if got_app != application {
        return Err("application mismatch".to_string());
    }
    let got_adoption = storage
        .get_adoption(adoption.id)
        .await
        .map_err(step("adoption"))?;
    if got_adoption != adoption {
        return Err("adoption mismatch".to_string());
    }
    Ok(())
}

async fn duplicate_animal_id_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Max");
    seed(&storage, vec![animal.clone()], vec![], vec![]).await?;

    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    let result = storage.insert_animal(&mut snap, animal).await;
    // Backends may defer the check to commit.
    let result = match result {
        Ok(()) => storage.commit_snapshot(snap).await,
        Err(e) => {
            let _ = storage.abort_snapshot(snap).await;
            Err(e)
        }
    };
    match result {
        Err(StorageError::AlreadyExists { .. }) => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => Err("duplicate animal insert succeeded".to_string()),
    }
}

async fn duplicate_application_id_rejected_in_same_snapshot<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Bella");
    let application = make_application(&animal, "bella@example.org", T0);

    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    storage
        .insert_application(&mut snap, application.clone())
        .await
        .map_err(step("first insert"))?;
    let second = storage.insert_application(&mut snap, application).await;
    let _ = storage.abort_snapshot(snap).await;
    match second {
        Err(StorageError::AlreadyExists { .. }) => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => Err("second insert in the same snapshot succeeded".to_string()),
    }
}
