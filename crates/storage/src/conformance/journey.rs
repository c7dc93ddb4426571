use std::future::Future;

use argile_core::{JourneyStatus, Step};

use super::{fixed_now, TestResult};
use crate::ParcoursStorage;

pub(super) async fn run_journey_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "journey",
        "find_or_create_starts_at_eligibility_todo",
        find_or_create_starts_at_eligibility_todo(factory).await,
    ));
    results.push(TestResult::from_result(
        "journey",
        "find_or_create_is_idempotent",
        find_or_create_is_idempotent(factory).await,
    ));
    results.push(TestResult::from_result(
        "journey",
        "applicants_get_distinct_journeys",
        applicants_get_distinct_journeys(factory).await,
    ));
    results.push(TestResult::from_result(
        "journey",
        "find_by_applicant_and_id",
        find_by_applicant_and_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "journey",
        "find_by_unknown_applicant_is_none",
        find_by_unknown_applicant_is_none(factory).await,
    ));
    results.push(TestResult::from_result(
        "journey",
        "update_step_sets_step_and_status",
        update_step_sets_step_and_status(factory).await,
    ));
    results.push(TestResult::from_result(
        "journey",
        "update_status_keeps_step",
        update_status_keeps_step(factory).await,
    ));
    results.push(TestResult::from_result(
        "journey",
        "mark_completed_sets_completed_at",
        mark_completed_sets_completed_at(factory).await,
    ));
    results.push(TestResult::from_result(
        "journey",
        "simulation_data_attach_and_erase",
        simulation_data_attach_and_erase(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn find_or_create_starts_at_eligibility_todo<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let journey = s
        .find_or_create_journey("applicant-1", fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    if journey.current_step != Step::Eligibility {
        return Err(format!(
            "expected ELIGIBILITY, got {}",
            journey.current_step
        ));
    }
    if journey.current_status != JourneyStatus::Todo {
        return Err(format!("expected TODO, got {}", journey.current_status));
    }
    if journey.completed_at.is_some() {
        return Err("new journey must not be completed".to_string());
    }
    if journey.applicant_id != "applicant-1" {
        return Err(format!("wrong applicant id: {}", journey.applicant_id));
    }
    Ok(())
}

async fn find_or_create_is_idempotent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = s
        .find_or_create_journey("applicant-1", fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    s.update_journey_status(&first.id, JourneyStatus::UnderReview, fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    let second = s
        .find_or_create_journey("applicant-1", fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    if first.id != second.id {
        return Err(format!("expected same id, got {} and {}", first.id, second.id));
    }
    if second.current_status != JourneyStatus::UnderReview {
        return Err("find_or_create must not reset an existing journey".to_string());
    }
    Ok(())
}

async fn applicants_get_distinct_journeys<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s
        .find_or_create_journey("applicant-a", fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    let b = s
        .find_or_create_journey("applicant-b", fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    if a.id == b.id {
        return Err("two applicants share a journey id".to_string());
    }
    Ok(())
}

async fn find_by_applicant_and_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .find_or_create_journey("applicant-1", fixed_now())
        .await
        .map_err(|e| e.to_string())?;

    let by_applicant = s
        .find_journey_by_applicant("applicant-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("journey not found by applicant")?;
    let by_id = s
        .find_journey(&created.id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("journey not found by id")?;

    if by_applicant.id != created.id || by_id.id != created.id {
        return Err("lookups returned a different journey".to_string());
    }
    Ok(())
}

async fn find_by_unknown_applicant_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let found = s
        .find_journey_by_applicant("nobody")
        .await
        .map_err(|e| e.to_string())?;
    if found.is_some() {
        return Err("expected None for unknown applicant".to_string());
    }
    let found = s
        .find_journey("no-such-id")
        .await
        .map_err(|e| e.to_string())?;
    if found.is_some() {
        return Err("expected None for unknown id".to_string());
    }
    Ok(())
}

async fn update_step_sets_step_and_status<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let journey = s
        .find_or_create_journey("applicant-1", fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    let updated = s
        .update_journey_step(
            &journey.id,
            Step::Diagnostic,
            JourneyStatus::Todo,
            fixed_now(),
        )
        .await
        .map_err(|e| e.to_string())?;
    if updated.current_step != Step::Diagnostic || updated.current_status != JourneyStatus::Todo {
        return Err(format!(
            "expected DIAGNOSTIC/TODO, got {}/{}",
            updated.current_step, updated.current_status
        ));
    }
    let reread = s
        .find_journey(&journey.id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("journey vanished")?;
    if reread.current_step != Step::Diagnostic {
        return Err("update not persisted".to_string());
    }
    Ok(())
}

async fn update_status_keeps_step<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let journey = s
        .find_or_create_journey("applicant-1", fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    let updated = s
        .update_journey_status(&journey.id, JourneyStatus::Validated, fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    if updated.current_step != Step::Eligibility {
        return Err(format!("step changed to {}", updated.current_step));
    }
    if updated.current_status != JourneyStatus::Validated {
        return Err(format!("expected VALIDATED, got {}", updated.current_status));
    }
    Ok(())
}

async fn mark_completed_sets_completed_at<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let journey = s
        .find_or_create_journey("applicant-1", fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    let completed = s
        .mark_journey_completed(&journey.id, fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    if completed.completed_at != Some(fixed_now()) {
        return Err(format!(
            "expected completed_at {:?}, got {:?}",
            fixed_now(),
            completed.completed_at
        ));
    }
    Ok(())
}

async fn simulation_data_attach_and_erase<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let journey = s
        .find_or_create_journey("applicant-1", fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    let payload = serde_json::json!({"logement": {"commune": "36063", "zone_argile": "fort"}});
    let attached = s
        .attach_simulation_data(&journey.id, payload.clone(), fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    if attached.simulation_data.as_ref() != Some(&payload) {
        return Err("simulation data not attached".to_string());
    }
    let erased = s
        .erase_simulation_data(&journey.id, fixed_now())
        .await
        .map_err(|e| e.to_string())?;
    if erased.simulation_data.is_some() {
        return Err("simulation data not erased".to_string());
    }
    if erased.id != journey.id || erased.current_step != journey.current_step {
        return Err("erasing simulation data must keep the journey".to_string());
    }
    Ok(())
}
