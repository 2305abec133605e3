use std::future::Future;

use shelter_core::{AnimalStatus, ApplicationStatus};

use super::{make_adoption, make_animal, make_application, seed, step, TestResult, T0};
use crate::{ShelterStorage, StorageError};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "commit",
            "multi_entity_writes_all_visible_after_commit",
            multi_entity_writes_all_visible_after_commit(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "failed_commit_applies_nothing",
            failed_commit_applies_nothing(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "delete_removes_row",
            delete_removes_row(factory).await,
        ),
    ]
}

/// The adoption-creation shape: insert a record, complete the application and
/// adopt the animal in one snapshot.
async fn multi_entity_writes_all_visible_after_commit<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Nala");
    let application = make_application(&animal, "nala@example.org", T0);
    seed(
        &storage,
        vec![animal.clone()],
        vec![application.clone()],
        vec![],
    )
    .await?;

    let adoption = make_adoption(&application, T0);
    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    storage
        .insert_adoption(&mut snap, adoption.clone())
        .await
        .map_err(step("insert adoption"))?;
    let mut app = storage
        .get_application_for_update(&mut snap, application.id)
        .await
        .map_err(step("read application"))?;
    app.status = ApplicationStatus::Completed;
    storage
        .update_application(&mut snap, app, 0)
        .await
        .map_err(step("update application"))?;
    let mut pet = storage
        .get_animal_for_update(&mut snap, animal.id)
        .await
        .map_err(step("read animal"))?;
    pet.status = AnimalStatus::Adopted;
    storage
        .update_animal(&mut snap, pet, 0)
        .await
        .map_err(step("update animal"))?;
    storage.commit_snapshot(snap).await.map_err(step("commit"))?;

    storage
        .get_adoption(adoption.id)
        .await
        .map_err(step("adoption after commit"))?;
    let app = storage
        .get_application(application.id)
        .await
        .map_err(step("application after commit"))?;
    if app.status != ApplicationStatus::Completed || app.version != 1 {
        return Err(format!(
            "application not updated: {} v{}",
            app.status, app.version
        ));
    }
    let pet = storage
        .get_animal(animal.id)
        .await
        .map_err(step("animal after commit"))?;
    if pet.status != AnimalStatus::Adopted || pet.version != 1 {
        return Err(format!("animal not updated: {} v{}", pet.status, pet.version));
    }
    Ok(())
}

/// A snapshot whose commit fails on one stale row must leave every other row
/// it touched untouched.
async fn failed_commit_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Milo");
    let application = make_application(&animal, "milo@example.org", T0);
    seed(
        &storage,
        vec![animal.clone()],
        vec![application.clone()],
        vec![],
    )
    .await?;

    let adoption = make_adoption(&application, T0);
    let mut losing = storage.begin_snapshot().await.map_err(step("begin"))?;
    storage
        .insert_adoption(&mut losing, adoption.clone())
        .await
        .map_err(step("insert adoption"))?;
    let mut app = storage
        .get_application_for_update(&mut losing, application.id)
        .await
        .map_err(step("read application"))?;
    app.status = ApplicationStatus::Completed;
    storage
        .update_application(&mut losing, app, 0)
        .await
        .map_err(step("update application"))?;

    // Someone else moves the animal first.
    let mut winner = storage.begin_snapshot().await.map_err(step("begin winner"))?;
    let mut pet = storage
        .get_animal_for_update(&mut winner, animal.id)
        .await
        .map_err(step("winner read"))?;
    pet.status = AnimalStatus::Reserved;
    storage
        .update_animal(&mut winner, pet, 0)
        .await
        .map_err(step("winner update"))?;
    storage
        .commit_snapshot(winner)
        .await
        .map_err(step("winner commit"))?;

    let stale = storage.update_animal(&mut losing, animal.clone(), 0).await;
    let outcome = match stale {
        Ok(_) => storage.commit_snapshot(losing).await,
        Err(e) => {
            let _ = storage.abort_snapshot(losing).await;
            Err(e)
        }
    };
    match outcome {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        Err(e) => return Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(()) => return Err("stale snapshot committed".to_string()),
    }

    if storage.get_adoption(adoption.id).await.is_ok() {
        return Err("adoption from the failed snapshot is visible".to_string());
    }
    let app = storage
        .get_application(application.id)
        .await
        .map_err(step("application"))?;
    if app.status != ApplicationStatus::Submitted || app.version != 0 {
        return Err(format!("application changed: {} v{}", app.status, app.version));
    }
    Ok(())
}

async fn delete_removes_row<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Oscar");
    let application = make_application(&animal, "oscar@example.org", T0);
    let adoption = make_adoption(&application, T0);
    seed(
        &storage,
        vec![],
        vec![application.clone()],
        vec![adoption.clone()],
    )
    .await?;

    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    storage
        .delete_application(&mut snap, application.id, 0)
        .await
        .map_err(step("delete application"))?;
    storage
        .delete_adoption(&mut snap, adoption.id, 0)
        .await
        .map_err(step("delete adoption"))?;
    storage.commit_snapshot(snap).await.map_err(step("commit"))?;

    if storage.get_application(application.id).await.is_ok() {
        return Err("deleted application still visible".to_string());
    }
    if storage.get_adoption(adoption.id).await.is_ok() {
        return Err("deleted adoption still visible".to_string());
    }
    Ok(())
}
