use std::future::Future;

use argile_core::{JourneyStatus, Step};

use super::{fixed_now, TestResult};
use crate::{CaseUpdate, NotificationUpdate, ParcoursStorage, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "update_step_unknown_journey",
        update_step_unknown_journey(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_status_unknown_journey",
        update_status_unknown_journey(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "mark_completed_unknown_journey",
        mark_completed_unknown_journey(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_unknown_case",
        update_unknown_case(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_unknown_notification",
        update_unknown_notification(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_cases_empty_for_unknown_journey",
        list_cases_empty_for_unknown_journey(factory).await,
    ));

    results
}

fn expect_journey_not_found<T: std::fmt::Debug>(
    result: Result<T, StorageError>,
    id: &str,
) -> Result<(), String> {
    match result {
        Err(StorageError::JourneyNotFound { id: got }) if got == id => Ok(()),
        other => Err(format!("expected JourneyNotFound({}), got {:?}", id, other)),
    }
}

async fn update_step_unknown_journey<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_journey_not_found(
        s.update_journey_step("ghost", Step::Quote, JourneyStatus::Todo, fixed_now())
            .await,
        "ghost",
    )
}

async fn update_status_unknown_journey<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_journey_not_found(
        s.update_journey_status("ghost", JourneyStatus::Validated, fixed_now())
            .await,
        "ghost",
    )
}

async fn mark_completed_unknown_journey<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_journey_not_found(
        s.mark_journey_completed("ghost", fixed_now()).await,
        "ghost",
    )
}

async fn update_unknown_case<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s
        .update_case("ghost-case", CaseUpdate::default(), fixed_now())
        .await
    {
        Err(StorageError::CaseNotFound { id }) if id == "ghost-case" => Ok(()),
        other => Err(format!("expected CaseNotFound, got {:?}", other)),
    }
}

async fn update_unknown_notification<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s
        .update_notification("ghost-msg", NotificationUpdate::default(), fixed_now())
        .await
    {
        Err(StorageError::NotificationNotFound { message_id }) if message_id == "ghost-msg" => {
            Ok(())
        }
        other => Err(format!("expected NotificationNotFound, got {:?}", other)),
    }
}

async fn list_cases_empty_for_unknown_journey<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let cases = s
        .list_cases_for_journey("ghost")
        .await
        .map_err(|e| e.to_string())?;
    if !cases.is_empty() {
        return Err(format!("expected no cases, got {}", cases.len()));
    }
    Ok(())
}
