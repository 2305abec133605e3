use std::future::Future;

use shelter_core::{AdoptionId, AnimalId, ApplicationId};

use super::{make_animal, step, TestResult};
use crate::{EntityKind, ShelterStorage, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "get_missing_rows_not_found",
            get_missing_rows_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "get_for_update_missing_not_found",
            get_for_update_missing_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "update_missing_not_found",
            update_missing_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "delete_missing_not_found",
            delete_missing_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "lookups_empty_for_missing",
            lookups_empty_for_missing(factory).await,
        ),
    ]
}

fn expect_not_found<T>(
    result: Result<T, StorageError>,
    entity: EntityKind,
    what: &str,
) -> Result<(), String> {
    match result {
        Err(StorageError::NotFound { entity: got, .. }) if got == entity => Ok(()),
        Err(e) => Err(format!("{what}: expected {entity} NotFound, got {e}")),
        Ok(_) => Err(format!("{what}: expected NotFound, got a row")),
    }
}

async fn get_missing_rows_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    expect_not_found(
        storage.get_animal(AnimalId::new()).await,
        EntityKind::Animal,
        "get_animal",
    )?;
    expect_not_found(
        storage.get_application(ApplicationId::new()).await,
        EntityKind::Application,
        "get_application",
    )?;
    expect_not_found(
        storage.get_adoption(AdoptionId::new()).await,
        EntityKind::Adoption,
        "get_adoption",
    )
}

async fn get_for_update_missing_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    let animal = storage
        .get_animal_for_update(&mut snap, AnimalId::new())
        .await;
    let application = storage
        .get_application_for_update(&mut snap, ApplicationId::new())
        .await;
    let adoption = storage
        .get_adoption_for_update(&mut snap, AdoptionId::new())
        .await;
    let _ = storage.abort_snapshot(snap).await;

    expect_not_found(animal, EntityKind::Animal, "animal for update")?;
    expect_not_found(application, EntityKind::Application, "application for update")?;
    expect_not_found(adoption, EntityKind::Adoption, "adoption for update")
}

async fn update_missing_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    let result = storage
        .update_animal(&mut snap, make_animal("Ghost"), 0)
        .await;
    let _ = storage.abort_snapshot(snap).await;
    expect_not_found(result, EntityKind::Animal, "update_animal")
}

async fn delete_missing_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    let application = storage
        .delete_application(&mut snap, ApplicationId::new(), 0)
        .await;
    let adoption = storage
        .delete_adoption(&mut snap, AdoptionId::new(), 0)
        .await;
    let _ = storage.abort_snapshot(snap).await;
    expect_not_found(application, EntityKind::Application, "delete_application")?;
    expect_not_found(adoption, EntityKind::Adoption, "delete_adoption")
}

async fn lookups_empty_for_missing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let by_animal = storage
        .adoption_by_animal(AnimalId::new())
        .await
        .map_err(step("adoption_by_animal"))?;
    if by_animal.is_some() {
        return Err("adoption_by_animal returned a row for an unknown animal".to_string());
    }
    let by_application = storage
        .adoption_by_application(ApplicationId::new())
        .await
        .map_err(step("adoption_by_application"))?;
    if by_application.is_some() {
        return Err("adoption_by_application returned a row".to_string());
    }
    let apps = storage
        .applications_by_animal(AnimalId::new())
        .await
        .map_err(step("applications_by_animal"))?;
    if !apps.is_empty() {
        return Err(format!("expected no applications, got {}", apps.len()));
    }
    Ok(())
}
