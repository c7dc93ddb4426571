use std::future::Future;

use argile_core::{DsStatus, Step};

use super::{fixed_now, make_case, make_submitted_case, TestResult};
use crate::{CaseUpdate, ParcoursStorage, StorageError};

pub(super) async fn run_case_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "case",
        "create_then_find_by_journey_and_step",
        create_then_find_by_journey_and_step(factory).await,
    ));
    results.push(TestResult::from_result(
        "case",
        "duplicate_step_returns_already_exists",
        duplicate_step_returns_already_exists(factory).await,
    ));
    results.push(TestResult::from_result(
        "case",
        "same_step_on_other_journey_is_allowed",
        same_step_on_other_journey_is_allowed(factory).await,
    ));
    results.push(TestResult::from_result(
        "case",
        "find_by_ds_number",
        find_by_ds_number(factory).await,
    ));
    results.push(TestResult::from_result(
        "case",
        "partial_update_preserves_other_fields",
        partial_update_preserves_other_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "case",
        "list_cases_in_step_order",
        list_cases_in_step_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "case",
        "ds_number_is_unique_across_cases",
        ds_number_is_unique_across_cases(factory).await,
    ));

    results
}

async fn create_then_find_by_journey_and_step<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create_case(make_case("journey-1", Step::Eligibility))
        .await
        .map_err(|e| e.to_string())?;
    let found = s
        .find_case_by_journey_and_step("journey-1", Step::Eligibility)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("case not found after create")?;
    if found != created {
        return Err(format!("stored record differs: {:?} vs {:?}", found, created));
    }
    if found.ds_status != DsStatus::Draft || found.ds_number.is_some() {
        return Err("draft record must be DRAFT without a DS number".to_string());
    }
    let other_step = s
        .find_case_by_journey_and_step("journey-1", Step::Diagnostic)
        .await
        .map_err(|e| e.to_string())?;
    if other_step.is_some() {
        return Err("found a record for a step that was never created".to_string());
    }
    Ok(())
}

async fn duplicate_step_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_case(make_case("journey-1", Step::Quote))
        .await
        .map_err(|e| e.to_string())?;
    match s.create_case(make_case("journey-1", Step::Quote)).await {
        Err(StorageError::CaseAlreadyExists { journey_id, step }) => {
            if journey_id != "journey-1" || step != Step::Quote {
                return Err(format!(
                    "wrong fields in CaseAlreadyExists: {}/{}",
                    journey_id, step
                ));
            }
            Ok(())
        }
        other => Err(format!("expected CaseAlreadyExists, got {:?}", other)),
    }
}

async fn same_step_on_other_journey_is_allowed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_case(make_case("journey-1", Step::Quote))
        .await
        .map_err(|e| e.to_string())?;
    s.create_case(make_case("journey-2", Step::Quote))
        .await
        .map_err(|e| format!("second journey rejected: {e}"))?;
    Ok(())
}

async fn find_by_ds_number<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_case(make_submitted_case("journey-1", Step::Eligibility, 20_001))
        .await
        .map_err(|e| e.to_string())?;
    s.create_case(make_submitted_case("journey-2", Step::Eligibility, 20_002))
        .await
        .map_err(|e| e.to_string())?;

    let found = s
        .find_case_by_ds_number(20_002)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("case not found by DS number")?;
    if found.journey_id != "journey-2" {
        return Err(format!("wrong case returned: {}", found.journey_id));
    }
    let missing = s
        .find_case_by_ds_number(99_999)
        .await
        .map_err(|e| e.to_string())?;
    if missing.is_some() {
        return Err("expected None for unknown DS number".to_string());
    }
    Ok(())
}

async fn partial_update_preserves_other_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create_case(make_submitted_case("journey-1", Step::Diagnostic, 30_001))
        .await
        .map_err(|e| e.to_string())?;

    let updated = s
        .update_case(
            &created.id,
            CaseUpdate {
                ds_status: Some(DsStatus::Approved),
                processed_at: Some(fixed_now()),
                ..CaseUpdate::default()
            },
            fixed_now(),
        )
        .await
        .map_err(|e| e.to_string())?;

    if updated.ds_status != DsStatus::Approved {
        return Err(format!("expected APPROVED, got {}", updated.ds_status));
    }
    if updated.processed_at != Some(fixed_now()) {
        return Err("processed_at not set".to_string());
    }
    if updated.ds_number != Some(30_001) || updated.ds_url != created.ds_url {
        return Err("untouched fields were modified".to_string());
    }
    if updated.last_sync_at.is_some() {
        return Err("last_sync_at set without being requested".to_string());
    }
    Ok(())
}

async fn list_cases_in_step_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for step in [Step::Invoices, Step::Eligibility, Step::Quote] {
        s.create_case(make_case("journey-1", step))
            .await
            .map_err(|e| e.to_string())?;
    }
    s.create_case(make_case("journey-2", Step::Diagnostic))
        .await
        .map_err(|e| e.to_string())?;

    let steps: Vec<Step> = s
        .list_cases_for_journey("journey-1")
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|c| c.step)
        .collect();
    if steps != vec![Step::Eligibility, Step::Quote, Step::Invoices] {
        return Err(format!("unexpected step order: {:?}", steps));
    }
    Ok(())
}

async fn ds_number_is_unique_across_cases<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = s
        .create_case(make_submitted_case("journey-1", Step::Eligibility, 50_001))
        .await
        .map_err(|e| e.to_string())?;

    match s
        .create_case(make_submitted_case("journey-2", Step::Eligibility, 50_001))
        .await
    {
        Err(StorageError::DsNumberTaken { ds_number, case_id })
            if ds_number == 50_001 && case_id == owner.id => {}
        other => return Err(format!("expected DsNumberTaken on create, got {:?}", other)),
    }

    let other = s
        .create_case(make_case("journey-2", Step::Eligibility))
        .await
        .map_err(|e| e.to_string())?;
    let update = CaseUpdate {
        ds_number: Some(50_001),
        ..CaseUpdate::default()
    };
    match s.update_case(&other.id, update, fixed_now()).await {
        Err(StorageError::DsNumberTaken { case_id, .. }) if case_id == owner.id => {}
        other => return Err(format!("expected DsNumberTaken on update, got {:?}", other)),
    }

    let found = s
        .find_case_by_ds_number(50_001)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("owner no longer found by DS number")?;
    if found.id != owner.id {
        return Err("DS number lookup returned the wrong case".to_string());
    }
    Ok(())
}
