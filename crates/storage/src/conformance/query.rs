use std::future::Future;

use rust_decimal::Decimal;
use shelter_core::{AdoptionStatus, ApplicationStatus, PaymentStatus};
use time::Duration;

use super::{make_adoption, make_animal, make_application, seed, step, TestResult, T0};
use crate::{
    AdoptionFilter, ApplicationFilter, ApplicationSortField, ShelterStorage, SortOrder,
};

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "query",
            "list_applications_filters_and_pages",
            list_applications_filters_and_pages(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_applications_sorts",
            list_applications_sorts(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_adoptions_filters",
            list_adoptions_filters(factory).await,
        ),
        TestResult::from_result(
            "query",
            "pending_applications_only_submitted",
            pending_applications_only_submitted(factory).await,
        ),
        TestResult::from_result(
            "query",
            "adoption_by_animal_is_latest",
            adoption_by_animal_is_latest(factory).await,
        ),
        TestResult::from_result(
            "query",
            "pending_follow_ups_window",
            pending_follow_ups_window(factory).await,
        ),
        TestResult::from_result(
            "query",
            "statistics_reflect_committed_rows",
            statistics_reflect_committed_rows(factory).await,
        ),
    ]
}

async fn list_applications_filters_and_pages<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let rex = make_animal("Rex");
    let tom = make_animal("Tom");
    let mut apps = Vec::new();
    for i in 0..5 {
        apps.push(make_application(
            &rex,
            &format!("rex{i}@example.org"),
            T0 + Duration::hours(i),
        ));
    }
    apps.push(make_application(&tom, "Tom.Fan@Example.org", T0));
    seed(&storage, vec![], apps, vec![]).await?;

    let filter = ApplicationFilter {
        animal_id: Some(rex.id),
        limit: 2,
        offset: 1,
        ..ApplicationFilter::default()
    };
    let page = storage
        .list_applications(&filter)
        .await
        .map_err(step("list by animal"))?;
    if page.total != 5 || page.items.len() != 2 {
        return Err(format!(
            "expected total 5 and 2 items, got {} and {}",
            page.total,
            page.items.len()
        ));
    }
    // Default order is application_date descending: hours 4,3,2,1,0.
    if page.items[0].profile.applicant.email != "rex3@example.org" {
        return Err(format!(
            "unexpected first item {}",
            page.items[0].profile.applicant.email
        ));
    }

    let by_email = ApplicationFilter {
        applicant_email: Some("tom.fan@example.org".to_string()),
        ..ApplicationFilter::default()
    };
    let page = storage
        .list_applications(&by_email)
        .await
        .map_err(step("list by email"))?;
    if page.total != 1 || page.items[0].animal_id != tom.id {
        return Err(format!("email filter matched {} rows", page.total));
    }

    let by_name = ApplicationFilter {
        applicant_name: Some("test APP".to_string()),
        status: Some(ApplicationStatus::Submitted),
        ..ApplicationFilter::default()
    };
    let page = storage
        .list_applications(&by_name)
        .await
        .map_err(step("list by name"))?;
    if page.total != 6 {
        return Err(format!("name filter matched {} rows, expected 6", page.total));
    }
    Ok(())
}

async fn list_applications_sorts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Sorty");
    let early = make_application(&animal, "early@example.org", T0);
    let late = make_application(&animal, "late@example.org", T0 + Duration::days(1));
    seed(&storage, vec![], vec![late.clone(), early.clone()], vec![]).await?;

    let filter = ApplicationFilter {
        sort_by: ApplicationSortField::ApplicationDate,
        sort_order: SortOrder::Asc,
        ..ApplicationFilter::default()
    };
    let page = storage
        .list_applications(&filter)
        .await
        .map_err(step("list asc"))?;
    let ids: Vec<_> = page.items.iter().map(|a| a.id).collect();
    if ids != vec![early.id, late.id] {
        return Err("ascending sort returned the wrong order".to_string());
    }
    Ok(())
}

async fn list_adoptions_filters<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let a = make_animal("A");
    let b = make_animal("B");
    let first = make_adoption(&make_application(&a, "a@example.org", T0), T0);
    let mut second = make_adoption(&make_application(&b, "b@example.org", T0), T0);
    second.payment_status = PaymentStatus::Paid;
    second.trial_period = true;
    seed(&storage, vec![], vec![], vec![first.clone(), second.clone()]).await?;

    let paid = AdoptionFilter {
        payment_status: Some(PaymentStatus::Paid),
        ..AdoptionFilter::default()
    };
    let page = storage
        .list_adoptions(&paid)
        .await
        .map_err(step("list paid"))?;
    if page.total != 1 || page.items[0].id != second.id {
        return Err(format!("payment filter matched {} rows", page.total));
    }

    let trial = AdoptionFilter {
        trial_period: Some(false),
        animal_id: Some(a.id),
        ..AdoptionFilter::default()
    };
    let page = storage
        .list_adoptions(&trial)
        .await
        .map_err(step("list trial"))?;
    if page.total != 1 || page.items[0].id != first.id {
        return Err(format!("trial filter matched {} rows", page.total));
    }
    Ok(())
}

async fn pending_applications_only_submitted<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Queue");
    let waiting = make_application(&animal, "waiting@example.org", T0);
    let mut reviewing = make_application(&animal, "reviewing@example.org", T0);
    reviewing.status = ApplicationStatus::UnderReview;
    let mut approved = make_application(&animal, "approved@example.org", T0);
    approved.status = ApplicationStatus::Approved;
    seed(
        &storage,
        vec![],
        vec![waiting.clone(), reviewing, approved],
        vec![],
    )
    .await?;

    let pending = storage
        .pending_applications()
        .await
        .map_err(step("pending"))?;
    if pending.len() != 1 || pending[0].id != waiting.id {
        return Err(format!("expected only the submitted application, got {}", pending.len()));
    }
    let by_animal = storage
        .applications_by_animal(animal.id)
        .await
        .map_err(step("by animal"))?;
    if by_animal.len() != 3 {
        return Err(format!("expected 3 applications for animal, got {}", by_animal.len()));
    }
    Ok(())
}

async fn adoption_by_animal_is_latest<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Boomerang");
    let old = make_adoption(&make_application(&animal, "old@example.org", T0), T0);
    let later = T0 + Duration::days(60);
    let new = make_adoption(&make_application(&animal, "new@example.org", later), later);
    seed(&storage, vec![], vec![], vec![new.clone(), old]).await?;

    match storage
        .adoption_by_animal(animal.id)
        .await
        .map_err(step("by animal"))?
    {
        Some(found) if found.id == new.id => Ok(()),
        Some(_) => Err("adoption_by_animal returned an older record".to_string()),
        None => Err("adoption_by_animal returned nothing".to_string()),
    }
}

async fn pending_follow_ups_window<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Window");
    let app = make_application(&animal, "w@example.org", T0);

    let mut soon = make_adoption(&app, T0);
    soon.next_follow_up_date = Some(T0 + Duration::days(3));
    let mut sooner = make_adoption(&make_application(&animal, "x@example.org", T0), T0);
    sooner.next_follow_up_date = Some(T0 + Duration::days(1));
    let mut far = make_adoption(&make_application(&animal, "y@example.org", T0), T0);
    far.next_follow_up_date = Some(T0 + Duration::days(30));
    let mut past = make_adoption(&make_application(&animal, "z@example.org", T0), T0);
    past.next_follow_up_date = Some(T0 - Duration::days(1));
    let mut returned = make_adoption(&make_application(&animal, "r@example.org", T0), T0);
    returned.next_follow_up_date = Some(T0 + Duration::days(2));
    returned.status = AdoptionStatus::Returned;

    seed(
        &storage,
        vec![],
        vec![],
        vec![soon.clone(), sooner.clone(), far, past, returned],
    )
    .await?;

    let due = storage
        .pending_follow_ups(7, T0)
        .await
        .map_err(step("pending follow-ups"))?;
    let ids: Vec<_> = due.iter().map(|r| r.id).collect();
    if ids != vec![sooner.id, soon.id] {
        return Err(format!("expected 2 records in window, got {}", ids.len()));
    }
    Ok(())
}

async fn statistics_reflect_committed_rows<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ShelterStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let animal = make_animal("Stats");
    let kept = make_adoption(&make_application(&animal, "k@example.org", T0), T0);
    let mut back = make_adoption(&make_application(&animal, "b@example.org", T0), T0);
    back.status = AdoptionStatus::Returned;
    seed(&storage, vec![], vec![], vec![kept, back]).await?;

    let stats = storage
        .adoption_statistics(T0)
        .await
        .map_err(step("statistics"))?;
    if stats.total_adoptions != 2 || stats.returned_adoptions != 1 {
        return Err(format!(
            "expected 2 total and 1 returned, got {} and {}",
            stats.total_adoptions, stats.returned_adoptions
        ));
    }
    if stats.total_adoption_fees != Decimal::from(200) {
        return Err(format!("unexpected fee total {}", stats.total_adoption_fees));
    }
    if stats.return_rate != 50.0 {
        return Err(format!("unexpected return rate {}", stats.return_rate));
    }
    Ok(())
}
