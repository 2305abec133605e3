use std::future::Future;
use std::sync::Arc;

use shelter_core::AnimalStatus;

use super::{make_adoption, make_animal, make_application, seed, TestResult, T0};
use crate::{ShelterStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_animal_updates_exactly_one_wins",
            concurrent_animal_updates_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_adoption_inserts_exactly_one_wins",
            concurrent_adoption_inserts_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_updates_different_animals_all_succeed",
            concurrent_updates_different_animals_all_succeed(factory).await,
        ),
    ]
}

/// Count winners among spawned tasks; `Ok(true)` means the task committed.
async fn tally(
    handles: Vec<tokio::task::JoinHandle<Result<bool, StorageError>>>,
) -> Result<(usize, usize), String> {
    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }
    Ok((winners, losers))
}

/// Commit, treating a conflict at update or commit time as a lost race.
async fn commit_or_lose<S: ShelterStorage>(
    storage: &S,
    snapshot: S::Snapshot,
    staged: Result<(), StorageError>,
) -> Result<bool, StorageError> {
    let outcome = match staged {
        Ok(()) => storage.commit_snapshot(snapshot).await,
        Err(e) => {
            let _ = storage.abort_snapshot(snapshot).await;
            Err(e)
        }
    };
    match outcome {
        Ok(()) => Ok(true),
        Err(e) if e.is_conflict() => Ok(false),
        Err(e) => Err(e),
    }
}

// ── Concurrent update: exactly one wins ─────────────────────────────────────

/// N tasks each open a snapshot and try to adopt the same animal from
/// version 0. Exactly one commit succeeds; the rest must conflict.
async fn concurrent_animal_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let animal = make_animal("Contested");
    let id = animal.id;
    seed(storage.as_ref(), vec![animal], vec![], vec![]).await?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let staged = async {
                let mut row = s.get_animal_for_update(&mut snap, id).await?;
                row.status = AnimalStatus::Adopted;
                s.update_animal(&mut snap, row, 0).await.map(|_| ())
            }
            .await;
            commit_or_lose(s.as_ref(), snap, staged).await
        }));
    }

    let (winners, losers) = tally(handles).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    Ok(())
}

// ── Concurrent adoption insert: uniqueness holds ────────────────────────────

async fn concurrent_adoption_inserts_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let animal = make_animal("Popular");
    let application = make_application(&animal, "popular@example.org", T0);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        let record = make_adoption(&application, T0);
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let staged = s.insert_adoption(&mut snap, record).await;
            commit_or_lose(s.as_ref(), snap, staged).await
        }));
    }

    let (winners, _) = tally(handles).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 adoption, got {winners}"));
    }
    Ok(())
}

// ── Concurrent updates to different animals: all succeed ────────────────────

/// No false conflicts when there is no contention.
async fn concurrent_updates_different_animals_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let animals: Vec<_> = (0..N).map(|i| make_animal(&format!("pup-{i}"))).collect();
    let ids: Vec<_> = animals.iter().map(|a| a.id).collect();
    seed(storage.as_ref(), animals, vec![], vec![]).await?;

    let mut handles = Vec::new();
    for id in ids.iter().copied() {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let staged = async {
                let mut row = s.get_animal_for_update(&mut snap, id).await?;
                row.status = AnimalStatus::Reserved;
                s.update_animal(&mut snap, row, 0).await.map(|_| ())
            }
            .await;
            commit_or_lose(s.as_ref(), snap, staged).await
        }));
    }

    let (winners, _) = tally(handles).await?;
    if winners != N {
        return Err(format!("expected {N} winners, got {winners}"));
    }
    for id in ids {
        let stored = storage
            .get_animal(id)
            .await
            .map_err(|e| format!("get {id}: {e}"))?;
        if stored.status != AnimalStatus::Reserved || stored.version != 1 {
            return Err(format!("animal {id} not updated"));
        }
    }
    Ok(())
}
