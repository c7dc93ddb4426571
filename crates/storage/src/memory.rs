//! In-memory store backend.
//!
//! All state lives behind one `tokio::sync::RwLock`. Cloning a
//! `MemoryStorage` shares the underlying maps.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use argile_core::{JourneyStatus, Step};

use crate::error::StorageError;
use crate::record::{CaseRecord, CaseUpdate, JourneyRecord, NotificationRecord, NotificationUpdate};
use crate::traits::{CaseStore, JourneyStore, NotificationStore};

#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    /// Journeys keyed by id.
    journeys: HashMap<String, JourneyRecord>,
    /// applicant id -> journey id
    journeys_by_applicant: HashMap<String, String>,
    /// Case records keyed by id.
    cases: HashMap<String, CaseRecord>,
    /// Notifications keyed by provider message id.
    notifications: HashMap<String, NotificationRecord>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn journey_count(&self) -> usize {
        self.inner.read().await.journeys.len()
    }

    pub async fn case_count(&self) -> usize {
        self.inner.read().await.cases.len()
    }

    pub async fn notification_count(&self) -> usize {
        self.inner.read().await.notifications.len()
    }
}

impl MemoryInner {
    fn journey_mut(&mut self, id: &str) -> Result<&mut JourneyRecord, StorageError> {
        self.journeys
            .get_mut(id)
            .ok_or_else(|| StorageError::JourneyNotFound { id: id.to_string() })
    }

    /// Fails if a case other than `case_id` already carries `ds_number`.
    fn ensure_ds_number_free(&self, ds_number: i64, case_id: &str) -> Result<(), StorageError> {
        match self
            .cases
            .values()
            .find(|c| c.ds_number == Some(ds_number) && c.id != case_id)
        {
            Some(owner) => Err(StorageError::DsNumberTaken {
                ds_number,
                case_id: owner.id.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl JourneyStore for MemoryStorage {
    async fn find_or_create_journey(
        &self,
        applicant_id: &str,
        now: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError> {
        let mut inner = self.inner.write().await;
        if let Some(id) = inner.journeys_by_applicant.get(applicant_id) {
            if let Some(journey) = inner.journeys.get(id) {
                return Ok(journey.clone());
            }
        }
        let journey = JourneyRecord::new(applicant_id, now);
        inner
            .journeys_by_applicant
            .insert(applicant_id.to_string(), journey.id.clone());
        inner.journeys.insert(journey.id.clone(), journey.clone());
        Ok(journey)
    }

    async fn find_journey_by_applicant(
        &self,
        applicant_id: &str,
    ) -> Result<Option<JourneyRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .journeys_by_applicant
            .get(applicant_id)
            .and_then(|id| inner.journeys.get(id))
            .cloned())
    }

    async fn find_journey(&self, id: &str) -> Result<Option<JourneyRecord>, StorageError> {
        Ok(self.inner.read().await.journeys.get(id).cloned())
    }

    async fn update_journey_step(
        &self,
        id: &str,
        step: Step,
        status: JourneyStatus,
        at: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError> {
        let mut inner = self.inner.write().await;
        let journey = inner.journey_mut(id)?;
        journey.current_step = step;
        journey.current_status = status;
        journey.updated_at = at;
        Ok(journey.clone())
    }

    async fn update_journey_status(
        &self,
        id: &str,
        status: JourneyStatus,
        at: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError> {
        let mut inner = self.inner.write().await;
        let journey = inner.journey_mut(id)?;
        journey.current_status = status;
        journey.updated_at = at;
        Ok(journey.clone())
    }

    async fn mark_journey_completed(
        &self,
        id: &str,
        at: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError> {
        let mut inner = self.inner.write().await;
        let journey = inner.journey_mut(id)?;
        journey.completed_at = Some(at);
        journey.updated_at = at;
        Ok(journey.clone())
    }

    async fn attach_simulation_data(
        &self,
        id: &str,
        data: serde_json::Value,
        at: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError> {
        let mut inner = self.inner.write().await;
        let journey = inner.journey_mut(id)?;
        journey.simulation_data = Some(data);
        journey.updated_at = at;
        Ok(journey.clone())
    }

    async fn erase_simulation_data(
        &self,
        id: &str,
        at: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError> {
        let mut inner = self.inner.write().await;
        let journey = inner.journey_mut(id)?;
        journey.simulation_data = None;
        journey.updated_at = at;
        Ok(journey.clone())
    }
}

#[async_trait]
impl CaseStore for MemoryStorage {
    async fn create_case(&self, record: CaseRecord) -> Result<CaseRecord, StorageError> {
        let mut inner = self.inner.write().await;
        if inner
            .cases
            .values()
            .any(|c| c.journey_id == record.journey_id && c.step == record.step)
        {
            return Err(StorageError::CaseAlreadyExists {
                journey_id: record.journey_id,
                step: record.step,
            });
        }
        if let Some(number) = record.ds_number {
            inner.ensure_ds_number_free(number, &record.id)?;
        }
        inner.cases.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find_case_by_journey_and_step(
        &self,
        journey_id: &str,
        step: Step,
    ) -> Result<Option<CaseRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .cases
            .values()
            .find(|c| c.journey_id == journey_id && c.step == step)
            .cloned())
    }

    async fn find_case_by_ds_number(
        &self,
        ds_number: i64,
    ) -> Result<Option<CaseRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .cases
            .values()
            .find(|c| c.ds_number == Some(ds_number))
            .cloned())
    }

    async fn list_cases_for_journey(
        &self,
        journey_id: &str,
    ) -> Result<Vec<CaseRecord>, StorageError> {
        let inner = self.inner.read().await;
        let mut cases: Vec<CaseRecord> = inner
            .cases
            .values()
            .filter(|c| c.journey_id == journey_id)
            .cloned()
            .collect();
        cases.sort_by_key(|c| c.step);
        Ok(cases)
    }

    async fn update_case(
        &self,
        id: &str,
        update: CaseUpdate,
        at: OffsetDateTime,
    ) -> Result<CaseRecord, StorageError> {
        let mut inner = self.inner.write().await;
        if !inner.cases.contains_key(id) {
            return Err(StorageError::CaseNotFound { id: id.to_string() });
        }
        if let Some(number) = update.ds_number {
            inner.ensure_ds_number_free(number, id)?;
        }
        let record = inner
            .cases
            .get_mut(id)
            .ok_or_else(|| StorageError::CaseNotFound { id: id.to_string() })?;
        update.apply(record, at);
        Ok(record.clone())
    }
}

#[async_trait]
impl NotificationStore for MemoryStorage {
    async fn create_notification(
        &self,
        record: NotificationRecord,
    ) -> Result<NotificationRecord, StorageError> {
        let mut inner = self.inner.write().await;
        if inner.notifications.contains_key(&record.message_id) {
            return Err(StorageError::NotificationAlreadyExists {
                message_id: record.message_id,
            });
        }
        inner
            .notifications
            .insert(record.message_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_notification_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<NotificationRecord>, StorageError> {
        Ok(self
            .inner
            .read()
            .await
            .notifications
            .get(message_id)
            .cloned())
    }

    async fn update_notification(
        &self,
        message_id: &str,
        update: NotificationUpdate,
        at: OffsetDateTime,
    ) -> Result<NotificationRecord, StorageError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .notifications
            .get_mut(message_id)
            .ok_or_else(|| StorageError::NotificationNotFound {
                message_id: message_id.to_string(),
            })?;
        update.apply(record, at);
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const NOW: OffsetDateTime = datetime!(2025-03-01 10:00 UTC);

    #[tokio::test]
    async fn clones_share_state() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.find_or_create_journey("applicant-1", NOW).await.unwrap();
        assert_eq!(b.journey_count().await, 1);
    }

    #[tokio::test]
    async fn list_cases_sorted_by_step() {
        let s = MemoryStorage::new();
        let journey = s.find_or_create_journey("applicant-1", NOW).await.unwrap();
        for step in [Step::Quote, Step::Eligibility, Step::Diagnostic] {
            s.create_case(CaseRecord::draft(&journey.id, step, None, NOW))
                .await
                .unwrap();
        }
        let steps: Vec<Step> = s
            .list_cases_for_journey(&journey.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.step)
            .collect();
        assert_eq!(
            steps,
            vec![Step::Eligibility, Step::Diagnostic, Step::Quote]
        );
    }

    #[tokio::test]
    async fn mutations_stamp_the_given_time() {
        let s = MemoryStorage::new();
        let journey = s.find_or_create_journey("applicant-1", NOW).await.unwrap();
        let later = datetime!(2025-03-02 08:30 UTC);
        let updated = s
            .update_journey_status(&journey.id, JourneyStatus::UnderReview, later)
            .await
            .unwrap();
        assert_eq!(updated.created_at, NOW);
        assert_eq!(updated.updated_at, later);

        let case = s
            .create_case(CaseRecord::draft(&journey.id, Step::Eligibility, None, NOW))
            .await
            .unwrap();
        let case = s
            .update_case(&case.id, CaseUpdate::default(), later)
            .await
            .unwrap();
        assert_eq!(case.updated_at, later);
    }

    #[tokio::test]
    async fn ds_number_cannot_move_to_a_second_case() {
        let s = MemoryStorage::new();
        let alice = s.find_or_create_journey("alice", NOW).await.unwrap();
        let bob = s.find_or_create_journey("bob", NOW).await.unwrap();
        let mut first = CaseRecord::draft(&alice.id, Step::Eligibility, None, NOW);
        first.ds_number = Some(555);
        let first = s.create_case(first).await.unwrap();
        let second = s
            .create_case(CaseRecord::draft(&bob.id, Step::Eligibility, None, NOW))
            .await
            .unwrap();

        let update = CaseUpdate {
            ds_number: Some(555),
            ..CaseUpdate::default()
        };
        let err = s.update_case(&second.id, update, NOW).await.unwrap_err();
        assert_eq!(
            err,
            StorageError::DsNumberTaken {
                ds_number: 555,
                case_id: first.id.clone(),
            }
        );

        // Re-setting the number on its owner is fine.
        let update = CaseUpdate {
            ds_number: Some(555),
            ..CaseUpdate::default()
        };
        assert!(s.update_case(&first.id, update, NOW).await.is_ok());
    }
}
