use std::future::Future;

use shelter_core::AnimalStatus;

use super::{make_animal, make_application, seed, step, TestResult, T0};
use crate::ShelterStorage;

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "uncommitted_insert_invisible_outside",
            uncommitted_insert_invisible_outside(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "snapshot_reads_its_own_writes",
            snapshot_reads_its_own_writes(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "aborted_update_discarded",
            aborted_update_discarded(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "dropped_snapshot_discarded",
            dropped_snapshot_discarded(factory).await,
        ),
    ]
}

async fn uncommitted_insert_invisible_outside<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Shadow");
    let application = make_application(&animal, "shadow@example.org", T0);
    let id = application.id;

    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    storage
        .insert_application(&mut snap, application)
        .await
        .map_err(step("insert"))?;

    let outside = storage.get_application(id).await;
    if outside.is_ok() {
        let _ = storage.abort_snapshot(snap).await;
        return Err("uncommitted application visible outside its snapshot".to_string());
    }

    storage.commit_snapshot(snap).await.map_err(step("commit"))?;
    storage
        .get_application(id)
        .await
        .map_err(step("get after commit"))?;
    Ok(())
}

async fn snapshot_reads_its_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Echo");
    let id = animal.id;
    seed(&storage, vec![animal], vec![], vec![]).await?;

    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    let mut row = storage
        .get_animal_for_update(&mut snap, id)
        .await
        .map_err(step("read"))?;
    row.status = AnimalStatus::Adopted;
    storage
        .update_animal(&mut snap, row, 0)
        .await
        .map_err(step("update"))?;
    let reread = storage
        .get_animal_for_update(&mut snap, id)
        .await
        .map_err(step("reread"))?;
    let _ = storage.abort_snapshot(snap).await;

    if reread.status != AnimalStatus::Adopted || reread.version != 1 {
        return Err(format!(
            "snapshot did not see its own write: status {} version {}",
            reread.status, reread.version
        ));
    }
    Ok(())
}

async fn aborted_update_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Biscuit");
    let id = animal.id;
    seed(&storage, vec![animal], vec![], vec![]).await?;

    let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
    let mut row = storage
        .get_animal_for_update(&mut snap, id)
        .await
        .map_err(step("read"))?;
    row.status = AnimalStatus::Adopted;
    storage
        .update_animal(&mut snap, row, 0)
        .await
        .map_err(step("update"))?;
    storage.abort_snapshot(snap).await.map_err(step("abort"))?;

    let after = storage.get_animal(id).await.map_err(step("get"))?;
    if after.status != AnimalStatus::Available || after.version != 0 {
        return Err(format!(
            "aborted update leaked: status {} version {}",
            after.status, after.version
        ));
    }
    Ok(())
}

async fn dropped_snapshot_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Pepper");
    let id = animal.id;
    {
        let mut snap = storage.begin_snapshot().await.map_err(step("begin"))?;
        storage
            .insert_animal(&mut snap, animal)
            .await
            .map_err(step("insert"))?;
    }
    if storage.get_animal(id).await.is_ok() {
        return Err("dropped snapshot's insert became visible".to_string());
    }
    Ok(())
}
