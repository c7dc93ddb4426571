use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use argile_core::Step;
use argile_storage::{CaseRecord, CaseUpdate, JourneyRecord, ParcoursStorage, StorageError};

use crate::clock::Clock;
use crate::config::DsSettings;
use crate::ds::{DossierSource, DsUrls};
use crate::error::ParcoursError;
use crate::progression::ProgressionService;
use crate::sync::SyncService;
use crate::webhook::EmailTrackingService;

/// A journey with its case records, in step order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneyOverview {
    pub journey: JourneyRecord,
    pub cases: Vec<CaseRecord>,
}

/// The parcours services wired to one store, dossier source and clock.
pub struct ParcoursEngine<S> {
    storage: Arc<S>,
    progression: ProgressionService<S>,
    sync: SyncService<S>,
    tracking: EmailTrackingService<S>,
}

impl<S> Clone for ParcoursEngine<S> {
    fn clone(&self) -> Self {
        ParcoursEngine {
            storage: self.storage.clone(),
            progression: self.progression.clone(),
            sync: self.sync.clone(),
            tracking: self.tracking.clone(),
        }
    }
}

impl<S: ParcoursStorage> ParcoursEngine<S> {
    pub fn new(
        storage: Arc<S>,
        source: Arc<dyn DossierSource>,
        clock: Arc<dyn Clock>,
        ds: &DsSettings,
    ) -> Self {
        let progression =
            ProgressionService::new(storage.clone(), clock.clone(), ds.demarches.clone());
        let sync = SyncService::new(progression.clone(), source, DsUrls::new(&ds.base_url));
        let tracking = EmailTrackingService::new(storage.clone(), clock);
        ParcoursEngine {
            storage,
            progression,
            sync,
            tracking,
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn progression(&self) -> &ProgressionService<S> {
        &self.progression
    }

    pub fn sync(&self) -> &SyncService<S> {
        &self.sync
    }

    pub fn tracking(&self) -> &EmailTrackingService<S> {
        &self.tracking
    }

    /// The applicant's journey, created at ELIGIBILITY / TODO on first access.
    pub async fn journey_overview(
        &self,
        applicant_id: &str,
    ) -> Result<JourneyOverview, ParcoursError> {
        let now = self.progression.clock().now();
        let journey = self
            .storage
            .find_or_create_journey(applicant_id, now)
            .await?;
        let cases = self.storage.list_cases_for_journey(&journey.id).await?;
        Ok(JourneyOverview { journey, cases })
    }

    /// Attach a DS dossier to `step` of the applicant's journey.
    ///
    /// Called once the applicant has opened a (possibly prefilled) dossier
    /// on DS. The case record is created if missing. A dossier number that
    /// already belongs to another case is refused with
    /// [`ParcoursError::DsNumberTaken`].
    pub async fn register_dossier(
        &self,
        applicant_id: &str,
        step: Step,
        ds_number: i64,
        ds_url: Option<String>,
    ) -> Result<CaseRecord, ParcoursError> {
        let now = self.progression.clock().now();
        let journey = self
            .storage
            .find_or_create_journey(applicant_id, now)
            .await?;

        if let Some(owner) = self.storage.find_case_by_ds_number(ds_number).await? {
            if owner.journey_id != journey.id || owner.step != step {
                warn!(
                    applicant_id,
                    %step,
                    ds_number,
                    owner_case = %owner.id,
                    "dossier already attached to another case"
                );
                return Err(ParcoursError::DsNumberTaken { ds_number });
            }
        }

        let case = self.progression.ensure_case(&journey.id, step).await?;
        let update = CaseUpdate {
            ds_number: Some(ds_number),
            ds_url,
            demarche_id: case
                .demarche_id
                .is_none()
                .then(|| self.progression.demarches().for_step(step).map(str::to_string))
                .flatten(),
            ..CaseUpdate::default()
        };
        let case = self
            .storage
            .update_case(&case.id, update, now)
            .await
            .map_err(|e| match e {
                StorageError::DsNumberTaken { ds_number, .. } => {
                    ParcoursError::DsNumberTaken { ds_number }
                }
                other => other.into(),
            })?;
        info!(applicant_id, %step, ds_number, "dossier registered");
        Ok(case)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argile_core::{DsStatus, JourneyStatus};
    use time::macros::datetime;

    use crate::clock::FixedClock;
    use crate::config::DemarcheIds;
    use crate::ds::StaticDossierSource;
    use argile_storage::{CaseStore, MemoryStorage};

    fn engine() -> ParcoursEngine<MemoryStorage> {
        let ds = DsSettings {
            demarches: DemarcheIds {
                eligibilite: Some("E-1".into()),
                ..DemarcheIds::default()
            },
            ..DsSettings::default()
        };
        ParcoursEngine::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(StaticDossierSource::new()),
            Arc::new(FixedClock::new(datetime!(2025-06-01 10:00 UTC))),
            &ds,
        )
    }

    #[tokio::test]
    async fn overview_creates_journey() {
        let engine = engine();
        let overview = engine.journey_overview("a-1").await.unwrap();
        assert_eq!(overview.journey.current_step, Step::Eligibility);
        assert_eq!(overview.journey.current_status, JourneyStatus::Todo);
        assert!(overview.cases.is_empty());
        let again = engine.journey_overview("a-1").await.unwrap();
        assert_eq!(again.journey.id, overview.journey.id);
    }

    #[tokio::test]
    async fn register_dossier_creates_case_with_demarche() {
        let engine = engine();
        let case = engine
            .register_dossier(
                "a-1",
                Step::Eligibility,
                4242,
                Some("https://www.demarches-simplifiees.fr/commencer/x?prefill_token=t".into()),
            )
            .await
            .unwrap();
        assert_eq!(case.ds_number, Some(4242));
        assert_eq!(case.ds_status, DsStatus::Draft);
        assert_eq!(case.demarche_id.as_deref(), Some("E-1"));

        let overview = engine.journey_overview("a-1").await.unwrap();
        assert_eq!(overview.cases, vec![case]);
    }

    #[tokio::test]
    async fn register_dossier_is_idempotent_for_the_owner() {
        let engine = engine();
        let first = engine
            .register_dossier("a-1", Step::Eligibility, 4242, None)
            .await
            .unwrap();
        let again = engine
            .register_dossier("a-1", Step::Eligibility, 4242, None)
            .await
            .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.ds_number, Some(4242));
    }

    #[tokio::test]
    async fn register_dossier_refuses_a_number_owned_by_another_applicant() {
        let engine = engine();
        engine
            .register_dossier("alice", Step::Eligibility, 555, None)
            .await
            .unwrap();

        let err = engine
            .register_dossier("bob", Step::Eligibility, 555, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParcoursError::DsNumberTaken { ds_number: 555 }
        ));

        let bob = engine.journey_overview("bob").await.unwrap();
        assert!(bob.cases.is_empty());
        let owner = engine
            .storage()
            .find_case_by_ds_number(555)
            .await
            .unwrap()
            .unwrap();
        let alice = engine.journey_overview("alice").await.unwrap();
        assert_eq!(owner.journey_id, alice.journey.id);
    }

    #[tokio::test]
    async fn register_dossier_refuses_a_number_used_on_another_step() {
        let engine = engine();
        engine
            .register_dossier("a-1", Step::Eligibility, 900, None)
            .await
            .unwrap();
        let err = engine
            .register_dossier("a-1", Step::Diagnostic, 900, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParcoursError::DsNumberTaken { ds_number: 900 }
        ));
    }
}
