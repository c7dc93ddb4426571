//! Pull dossier status from Démarches Simplifiées into the local records.
//!
//! A sync reads one dossier, records its status on the case, reflects it
//! on the journey when the case belongs to the current step, and hands off
//! to [`ProgressionService`] once that step is validated. Re-running a sync
//! against an unchanged dossier writes nothing but `last_sync_at`, so
//! concurrent or repeated syncs are harmless.

use std::sync::Arc;

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use argile_core::{DsStatus, JourneyStatus, Step};
use argile_storage::{CaseRecord, CaseUpdate, JourneyRecord, ParcoursStorage};

use crate::ds::{DossierSource, DsError, DsUrls};
use crate::error::ParcoursError;
use crate::progression::{ProgressionOutcome, ProgressionService};

/// Age after which a case is considered stale by [`SyncService::needs_sync`].
pub const DEFAULT_SYNC_MAX_AGE: Duration = Duration::minutes(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    /// True when the case status changed.
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<DsStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<DsStatus>,
    pub message: String,
    /// Present when the sync triggered a progression attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progression: Option<ProgressionOutcome>,
}

impl SyncOutcome {
    fn unchanged(status: Option<DsStatus>, message: impl Into<String>) -> Self {
        SyncOutcome {
            updated: false,
            old_status: status,
            new_status: status,
            message: message.into(),
            progression: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSyncReport {
    pub step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SyncOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncAllReport {
    pub steps: Vec<StepSyncReport>,
}

impl SyncAllReport {
    pub fn any_updated(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.outcome.as_ref().is_some_and(|o| o.updated))
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepSyncReport> {
        self.steps.iter().filter(|s| s.error.is_some())
    }
}

pub struct SyncService<S> {
    progression: ProgressionService<S>,
    source: Arc<dyn DossierSource>,
    urls: DsUrls,
}

impl<S> Clone for SyncService<S> {
    fn clone(&self) -> Self {
        SyncService {
            progression: self.progression.clone(),
            source: self.source.clone(),
            urls: self.urls.clone(),
        }
    }
}

impl<S: ParcoursStorage> SyncService<S> {
    pub fn new(
        progression: ProgressionService<S>,
        source: Arc<dyn DossierSource>,
        urls: DsUrls,
    ) -> Self {
        SyncService {
            progression,
            source,
            urls,
        }
    }

    fn storage(&self) -> &S {
        self.progression.storage()
    }

    async fn load_journey(&self, applicant_id: &str) -> Result<JourneyRecord, ParcoursError> {
        self.storage()
            .find_journey_by_applicant(applicant_id)
            .await?
            .ok_or_else(|| ParcoursError::JourneyNotFound(applicant_id.to_string()))
    }

    /// Sync the dossier backing `step` of the applicant's journey.
    pub async fn sync(&self, applicant_id: &str, step: Step) -> Result<SyncOutcome, ParcoursError> {
        let journey = self.load_journey(applicant_id).await?;
        let case = self
            .storage()
            .find_case_by_journey_and_step(&journey.id, step)
            .await?;

        match case {
            Some(case) => match case.ds_number {
                Some(number) => self.sync_case(&journey, case, number).await,
                None => Ok(not_submitted(Some(case.ds_status))),
            },
            None => Ok(not_submitted(None)),
        }
    }

    /// Sync the case record holding DS dossier `number`.
    ///
    /// Entry point for callers that only know the dossier number, such as
    /// a DS webhook.
    pub async fn sync_by_ds_number(&self, number: i64) -> Result<SyncOutcome, ParcoursError> {
        let case = self
            .storage()
            .find_case_by_ds_number(number)
            .await?
            .ok_or(ParcoursError::CaseNotFound { ds_number: number })?;
        let journey = self
            .storage()
            .find_journey(&case.journey_id)
            .await?
            .ok_or_else(|| ParcoursError::JourneyNotFound(case.journey_id.clone()))?;
        self.sync_case(&journey, case, number).await
    }

    async fn sync_case(
        &self,
        journey: &JourneyRecord,
        case: CaseRecord,
        number: i64,
    ) -> Result<SyncOutcome, ParcoursError> {
        let now = self.progression.clock().now();
        let old_status = case.ds_status;

        let snapshot = match self.source.get_dossier(number).await {
            Ok(snapshot) => snapshot,
            Err(DsError::NotFound { .. }) => {
                debug!(ds_number = number, "dossier not found on DS, still a draft");
                self.touch(&case, None, now).await?;
                return Ok(SyncOutcome::unchanged(
                    Some(old_status),
                    "Dossier encore en brouillon sur Démarches Simplifiées",
                ));
            }
            Err(e) => return Err(e.into()),
        };
        let new_status = snapshot.state;

        if new_status == old_status {
            let ds_url = self.url_repair(&case, new_status, number);
            self.touch(&case, ds_url, now).await?;
            let progression = self
                .reconcile_journey(journey, case.step, new_status)
                .await?;
            return Ok(SyncOutcome {
                progression,
                ..SyncOutcome::unchanged(Some(old_status), "Statut inchangé")
            });
        }

        if old_status.is_approved() {
            warn!(
                ds_number = number,
                reported = %new_status,
                "refusing to revert an approved dossier"
            );
            self.touch(&case, None, now).await?;
            return Ok(SyncOutcome::unchanged(
                Some(old_status),
                "Dossier déjà accepté, statut conservé",
            ));
        }

        let mut update = CaseUpdate {
            ds_status: Some(new_status),
            last_sync_at: Some(now),
            ..CaseUpdate::default()
        };
        if new_status.is_approved() {
            update.processed_at = Some(snapshot.date_traitement.unwrap_or(now));
        }
        if case.submitted_at.is_none() {
            update.submitted_at = snapshot.date_depot;
        }
        if !new_status.is_draft() {
            update.ds_url = Some(self.urls.dossier_url(number));
        }
        self.storage().update_case(&case.id, update, now).await?;
        info!(
            ds_number = number,
            step = %case.step,
            from = %old_status,
            to = %new_status,
            "case status updated"
        );

        let progression = self
            .reconcile_journey(journey, case.step, new_status)
            .await?;
        Ok(SyncOutcome {
            updated: true,
            old_status: Some(old_status),
            new_status: Some(new_status),
            message: format!("Statut mis à jour : {}", new_status),
            progression,
        })
    }

    /// The canonical dossier URL when a submitted case still points at a
    /// prefill link (or at nothing).
    fn url_repair(&self, case: &CaseRecord, status: DsStatus, number: i64) -> Option<String> {
        if status.is_draft() {
            return None;
        }
        let stale = case.ds_url.as_deref().map_or(true, DsUrls::is_prefill_url);
        stale.then(|| self.urls.dossier_url(number))
    }

    async fn touch(
        &self,
        case: &CaseRecord,
        ds_url: Option<String>,
        now: OffsetDateTime,
    ) -> Result<(), ParcoursError> {
        let update = CaseUpdate {
            last_sync_at: Some(now),
            ds_url,
            ..CaseUpdate::default()
        };
        self.storage().update_case(&case.id, update, now).await?;
        Ok(())
    }

    /// Reflect `status` on the journey if `step` is its current step, then
    /// progress when that makes the step VALIDATED.
    async fn reconcile_journey(
        &self,
        journey: &JourneyRecord,
        step: Step,
        status: DsStatus,
    ) -> Result<Option<ProgressionOutcome>, ParcoursError> {
        if step != journey.current_step || journey.is_completed() {
            return Ok(None);
        }

        let local = status.to_journey_status();
        if journey.current_status != local {
            let now = self.progression.clock().now();
            self.storage()
                .update_journey_status(&journey.id, local, now)
                .await?;
            info!(
                journey_id = %journey.id,
                %step,
                from = %journey.current_status,
                to = %local,
                "journey status updated"
            );
        }

        if local == JourneyStatus::Validated {
            let outcome = self.progression.progress(&journey.applicant_id).await?;
            return Ok(Some(outcome));
        }
        Ok(None)
    }

    /// Sync every step in order. A failing step is reported and does not
    /// stop the others.
    pub async fn sync_all(&self, applicant_id: &str) -> Result<SyncAllReport, ParcoursError> {
        self.load_journey(applicant_id).await?;

        let mut steps = Vec::with_capacity(Step::ALL.len());
        for step in Step::ALL {
            match self.sync(applicant_id, step).await {
                Ok(outcome) => steps.push(StepSyncReport {
                    step,
                    outcome: Some(outcome),
                    error: None,
                }),
                Err(e) => {
                    warn!(applicant_id, %step, error = %e, "step sync failed");
                    steps.push(StepSyncReport {
                        step,
                        outcome: None,
                        error: Some(e.user_message().to_string()),
                    });
                }
            }
        }
        Ok(SyncAllReport { steps })
    }

    /// True when the step's dossier has been submitted and was last synced
    /// more than `max_age` ago (or never). False when there is nothing to sync.
    pub async fn needs_sync(
        &self,
        applicant_id: &str,
        step: Step,
        max_age: Duration,
    ) -> Result<bool, ParcoursError> {
        let Some(journey) = self
            .storage()
            .find_journey_by_applicant(applicant_id)
            .await?
        else {
            return Ok(false);
        };
        let Some(case) = self
            .storage()
            .find_case_by_journey_and_step(&journey.id, step)
            .await?
        else {
            return Ok(false);
        };
        if case.ds_number.is_none() {
            return Ok(false);
        }
        Ok(match case.last_sync_at {
            None => true,
            Some(at) => self.progression.clock().now() - at > max_age,
        })
    }
}

fn not_submitted(status: Option<DsStatus>) -> SyncOutcome {
    SyncOutcome::unchanged(
        status,
        "Dossier pas encore déposé sur Démarches Simplifiées",
    )
}
