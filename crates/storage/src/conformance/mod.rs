//! Conformance test suite for parcours store implementations.
//!
//! This module provides a backend-agnostic test suite that any backend
//! implementing [`ParcoursStorage`] can run to verify correctness. The suite
//! covers:
//!
//! - **Journeys**: find-or-create idempotence, step/status updates, completion,
//!   simulation payload erasure
//! - **Cases**: one record per (journey, step), lookups, partial updates
//! - **Notifications**: message-id correlation and partial updates
//! - **Error handling**: correct error variants for unknown ids
//! - **Concurrency**: racing find-or-create and independent updates
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use argile_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod case;
mod concurrent;
mod error;
mod journey;
mod notification;

use std::fmt;
use std::future::Future;

use time::macros::datetime;
use time::OffsetDateTime;

use argile_core::Step;

use crate::record::{CaseRecord, NotificationRecord};
use crate::ParcoursStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "journey", "case", "notification").
    pub category: String,
    /// Test name (e.g. "find_or_create_is_idempotent").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(journey::run_journey_tests(&factory).await);
    results.extend(case::run_case_tests(&factory).await);
    results.extend(notification::run_notification_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn fixed_now() -> OffsetDateTime {
    datetime!(2025-01-01 00:00 UTC)
}

fn make_case(journey_id: &str, step: Step) -> CaseRecord {
    CaseRecord::draft(
        journey_id,
        step,
        Some("demarche-test".to_string()),
        fixed_now(),
    )
}

fn make_submitted_case(journey_id: &str, step: Step, ds_number: i64) -> CaseRecord {
    let mut record = make_case(journey_id, step);
    record.ds_number = Some(ds_number);
    record.ds_url = Some(format!(
        "https://www.demarches-simplifiees.fr/dossiers/{}",
        ds_number
    ));
    record
}

fn make_notification(message_id: &str) -> NotificationRecord {
    NotificationRecord::sent(
        message_id,
        "demandeur@example.fr",
        "validation_eligibilite",
        fixed_now(),
    )
}
