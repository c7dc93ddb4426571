use std::future::Future;
use std::sync::Arc;

use argile_core::{DsStatus, Step};

use super::{fixed_now, make_case, TestResult};
use crate::{CaseUpdate, ParcoursStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_find_or_create_yields_one_journey",
        concurrent_find_or_create_yields_one_journey(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_case_creation_exactly_one_wins",
        concurrent_case_creation_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_different_cases_all_succeed",
        concurrent_updates_different_cases_all_succeed(factory).await,
    ));

    results
}

/// N tasks race `find_or_create_journey` for the same applicant. All of them
/// must observe the same journey id.
async fn concurrent_find_or_create_yields_one_journey<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.find_or_create_journey("applicant-race", fixed_now()).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let journey = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        ids.push(journey.id);
    }
    ids.dedup();
    if ids.len() != 1 {
        return Err(format!("expected one journey id, got {:?}", ids));
    }
    Ok(())
}

/// N tasks try to create the case record for the same (journey, step).
/// Exactly one insert succeeds; the rest get CaseAlreadyExists.
async fn concurrent_case_creation_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            match s.create_case(make_case("journey-race", Step::Diagnostic)).await {
                Ok(_) => Ok(true),
                Err(StorageError::CaseAlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {}", winners));
    }
    Ok(())
}

/// Updates to distinct case records never interfere.
async fn concurrent_updates_different_cases_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut case_ids = Vec::new();
    for i in 0..N {
        let record = storage
            .create_case(make_case(&format!("journey-{i}"), Step::Quote))
            .await
            .map_err(|e| e.to_string())?;
        case_ids.push(record.id);
    }

    let mut handles = Vec::new();
    for (i, id) in case_ids.iter().enumerate() {
        let s = storage.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            s.update_case(
                &id,
                CaseUpdate {
                    ds_number: Some(40_000 + i as i64),
                    ds_status: Some(DsStatus::UnderReview),
                    ..CaseUpdate::default()
                },
                fixed_now(),
            )
            .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    for i in 0..N {
        let found = storage
            .find_case_by_ds_number(40_000 + i as i64)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("case {} lost its update", i))?;
        if found.ds_status != DsStatus::UnderReview {
            return Err(format!("case {} has status {}", i, found.ds_status));
        }
    }
    Ok(())
}
