//! Advance an applicant's journey once its current step is validated.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use argile_core::{JourneyStatus, Step};
use argile_storage::{CaseRecord, ParcoursStorage, StorageError};

use crate::clock::Clock;
use crate::config::DemarcheIds;
use crate::error::ParcoursError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressionOutcome {
    pub advanced: bool,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<Step>,
    pub message: String,
}

impl ProgressionOutcome {
    fn blocked(message: String) -> Self {
        ProgressionOutcome {
            advanced: false,
            completed: false,
            next_step: None,
            message,
        }
    }

    fn completed(message: &str) -> Self {
        ProgressionOutcome {
            advanced: false,
            completed: true,
            next_step: None,
            message: message.to_string(),
        }
    }
}

pub struct ProgressionService<S> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    demarches: DemarcheIds,
}

impl<S> Clone for ProgressionService<S> {
    fn clone(&self) -> Self {
        ProgressionService {
            storage: self.storage.clone(),
            clock: self.clock.clone(),
            demarches: self.demarches.clone(),
        }
    }
}

impl<S: ParcoursStorage> ProgressionService<S> {
    pub fn new(storage: Arc<S>, clock: Arc<dyn Clock>, demarches: DemarcheIds) -> Self {
        ProgressionService {
            storage,
            clock,
            demarches,
        }
    }

    pub(crate) fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn demarches(&self) -> &DemarcheIds {
        &self.demarches
    }

    /// Move the journey to the next step if the current one is VALIDATED.
    ///
    /// At the last step this marks the journey completed instead. A journey
    /// that is already completed is left untouched.
    pub async fn progress(&self, applicant_id: &str) -> Result<ProgressionOutcome, ParcoursError> {
        let journey = self
            .storage
            .find_journey_by_applicant(applicant_id)
            .await?
            .ok_or_else(|| ParcoursError::JourneyNotFound(applicant_id.to_string()))?;

        if journey.is_completed() {
            debug!(applicant_id, "journey already completed");
            return Ok(ProgressionOutcome::completed("Parcours déjà terminé"));
        }

        if journey.current_status != JourneyStatus::Validated {
            debug!(
                applicant_id,
                step = %journey.current_step,
                status = %journey.current_status,
                "progression refused, step not validated"
            );
            return Ok(ProgressionOutcome::blocked(format!(
                "L'étape {} doit être validée avant de passer à la suivante",
                journey.current_step.label()
            )));
        }

        let Some(next) = journey.current_step.next() else {
            self.storage
                .mark_journey_completed(&journey.id, self.clock.now())
                .await?;
            info!(applicant_id, journey_id = %journey.id, "journey completed");
            return Ok(ProgressionOutcome::completed("Parcours terminé"));
        };

        self.ensure_case(&journey.id, next).await?;
        self.storage
            .update_journey_step(&journey.id, next, JourneyStatus::Todo, self.clock.now())
            .await?;
        info!(
            applicant_id,
            journey_id = %journey.id,
            from = %journey.current_step,
            to = %next,
            "journey advanced"
        );

        Ok(ProgressionOutcome {
            advanced: true,
            completed: false,
            next_step: Some(next),
            message: format!("Passage à l'étape {}", next.label()),
        })
    }

    /// Return the case record for `(journey_id, step)`, creating a DRAFT one
    /// if none exists yet.
    pub(crate) async fn ensure_case(
        &self,
        journey_id: &str,
        step: Step,
    ) -> Result<CaseRecord, ParcoursError> {
        if let Some(existing) = self
            .storage
            .find_case_by_journey_and_step(journey_id, step)
            .await?
        {
            debug!(journey_id, %step, "reusing existing case record");
            return Ok(existing);
        }

        let draft = CaseRecord::draft(
            journey_id,
            step,
            self.demarches.for_step(step).map(str::to_string),
            self.clock.now(),
        );
        match self.storage.create_case(draft).await {
            Ok(created) => Ok(created),
            // Lost a race with a concurrent caller: use their record.
            Err(StorageError::CaseAlreadyExists { .. }) => self
                .storage
                .find_case_by_journey_and_step(journey_id, step)
                .await?
                .ok_or_else(|| {
                    StorageError::Backend(format!(
                        "case for {journey_id}/{step} reported existing but not found"
                    ))
                    .into()
                }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argile_core::DsStatus;
    use argile_storage::{CaseStore, JourneyStore, MemoryStorage};
    use time::macros::datetime;
    use time::OffsetDateTime;

    use crate::clock::FixedClock;

    const T0: OffsetDateTime = datetime!(2025-03-31 09:00 UTC);

    fn service(storage: &MemoryStorage) -> ProgressionService<MemoryStorage> {
        ProgressionService::new(
            Arc::new(storage.clone()),
            Arc::new(FixedClock::new(datetime!(2025-04-01 08:00 UTC))),
            DemarcheIds {
                diagnostic: Some("D-2".to_string()),
                ..DemarcheIds::default()
            },
        )
    }

    #[tokio::test]
    async fn unknown_applicant_is_not_found() {
        let storage = MemoryStorage::new();
        let err = service(&storage).progress("nobody").await.unwrap_err();
        assert!(matches!(err, ParcoursError::JourneyNotFound(id) if id == "nobody"));
    }

    #[tokio::test]
    async fn todo_step_does_not_advance() {
        let storage = MemoryStorage::new();
        let journey = storage.find_or_create_journey("a-1", T0).await.unwrap();

        let outcome = service(&storage).progress("a-1").await.unwrap();
        assert!(!outcome.advanced);
        assert!(!outcome.completed);
        assert!(outcome.message.contains("Éligibilité"));

        let after = storage.find_journey(&journey.id).await.unwrap().unwrap();
        assert_eq!(after, journey);
        assert_eq!(storage.case_count().await, 0);
    }

    #[tokio::test]
    async fn validated_step_advances_with_draft_case() {
        let storage = MemoryStorage::new();
        let journey = storage.find_or_create_journey("a-1", T0).await.unwrap();
        storage
            .update_journey_status(&journey.id, JourneyStatus::Validated, T0)
            .await
            .unwrap();

        let outcome = service(&storage).progress("a-1").await.unwrap();
        assert!(outcome.advanced);
        assert_eq!(outcome.next_step, Some(Step::Diagnostic));

        let after = storage.find_journey(&journey.id).await.unwrap().unwrap();
        assert_eq!(after.current_step, Step::Diagnostic);
        assert_eq!(after.current_status, JourneyStatus::Todo);
        assert_eq!(after.updated_at, datetime!(2025-04-01 08:00 UTC));

        let case = storage
            .find_case_by_journey_and_step(&journey.id, Step::Diagnostic)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(case.ds_status, DsStatus::Draft);
        assert_eq!(case.demarche_id.as_deref(), Some("D-2"));
        assert_eq!(case.ds_number, None);
    }

    #[tokio::test]
    async fn existing_next_case_is_reused() {
        let storage = MemoryStorage::new();
        let journey = storage.find_or_create_journey("a-1", T0).await.unwrap();
        let mut leftover = CaseRecord::draft(
            &journey.id,
            Step::Diagnostic,
            None,
            datetime!(2025-03-31 10:00 UTC),
        );
        leftover.ds_number = Some(777);
        let leftover = storage.create_case(leftover).await.unwrap();
        storage
            .update_journey_status(&journey.id, JourneyStatus::Validated, T0)
            .await
            .unwrap();

        let outcome = service(&storage).progress("a-1").await.unwrap();
        assert!(outcome.advanced);
        assert_eq!(storage.case_count().await, 1);
        let case = storage
            .find_case_by_journey_and_step(&journey.id, Step::Diagnostic)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(case, leftover);
    }

    #[tokio::test]
    async fn last_step_completes_once() {
        let storage = MemoryStorage::new();
        let journey = storage.find_or_create_journey("a-1", T0).await.unwrap();
        storage
            .update_journey_step(&journey.id, Step::Invoices, JourneyStatus::Validated, T0)
            .await
            .unwrap();
        let svc = service(&storage);

        let first = svc.progress("a-1").await.unwrap();
        assert!(first.completed);
        assert!(!first.advanced);
        let completed_at = storage
            .find_journey(&journey.id)
            .await
            .unwrap()
            .unwrap()
            .completed_at;
        assert_eq!(completed_at, Some(datetime!(2025-04-01 08:00 UTC)));

        let second = svc.progress("a-1").await.unwrap();
        assert!(second.completed);
        let after = storage.find_journey(&journey.id).await.unwrap().unwrap();
        assert_eq!(after.completed_at, completed_at);
        assert_eq!(after.current_step, Step::Invoices);
    }
}
