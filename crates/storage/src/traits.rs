use async_trait::async_trait;
use time::OffsetDateTime;

use argile_core::{JourneyStatus, Step};

use crate::error::StorageError;
use crate::record::{CaseRecord, CaseUpdate, JourneyRecord, NotificationRecord, NotificationUpdate};

/// Persistence for applicant journeys.
///
/// Every method is a single bounded read or write. Nothing here spans more
/// than one statement, so callers must tolerate a write landing while a
/// later one fails.
///
/// Mutations take the timestamp to record as `updated_at` so that callers
/// own the time source.
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait JourneyStore: Send + Sync + 'static {
    /// Return the applicant's journey, creating it at ELIGIBILITY / TODO if absent.
    ///
    /// Idempotent: repeated calls return the same record.
    async fn find_or_create_journey(
        &self,
        applicant_id: &str,
        now: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError>;

    async fn find_journey_by_applicant(
        &self,
        applicant_id: &str,
    ) -> Result<Option<JourneyRecord>, StorageError>;

    async fn find_journey(&self, id: &str) -> Result<Option<JourneyRecord>, StorageError>;

    /// Move the journey to `step` with `status`.
    ///
    /// Returns `Err(StorageError::JourneyNotFound)` if the journey does not exist.
    async fn update_journey_step(
        &self,
        id: &str,
        step: Step,
        status: JourneyStatus,
        at: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError>;

    async fn update_journey_status(
        &self,
        id: &str,
        status: JourneyStatus,
        at: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError>;

    /// Set `completed_at` (and `updated_at`) to `at`.
    async fn mark_journey_completed(
        &self,
        id: &str,
        at: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError>;

    async fn attach_simulation_data(
        &self,
        id: &str,
        data: serde_json::Value,
        at: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError>;

    /// Drop the simulation payload while keeping the journey itself.
    async fn erase_simulation_data(
        &self,
        id: &str,
        at: OffsetDateTime,
    ) -> Result<JourneyRecord, StorageError>;
}

/// Persistence for the per-step dossier records.
#[async_trait]
pub trait CaseStore: Send + Sync + 'static {
    /// Insert a new case record.
    ///
    /// Returns `Err(StorageError::CaseAlreadyExists)` if the journey already
    /// has a record for `record.step`, and `Err(StorageError::DsNumberTaken)`
    /// if another record already carries `record.ds_number`.
    async fn create_case(&self, record: CaseRecord) -> Result<CaseRecord, StorageError>;

    async fn find_case_by_journey_and_step(
        &self,
        journey_id: &str,
        step: Step,
    ) -> Result<Option<CaseRecord>, StorageError>;

    /// A DS dossier number belongs to at most one case record.
    async fn find_case_by_ds_number(
        &self,
        ds_number: i64,
    ) -> Result<Option<CaseRecord>, StorageError>;

    /// All case records of a journey, in step order.
    async fn list_cases_for_journey(
        &self,
        journey_id: &str,
    ) -> Result<Vec<CaseRecord>, StorageError>;

    /// Apply a partial update.
    ///
    /// Returns `Err(StorageError::CaseNotFound)` if the id is unknown and
    /// `Err(StorageError::DsNumberTaken)` if `update.ds_number` belongs to
    /// another record.
    async fn update_case(
        &self,
        id: &str,
        update: CaseUpdate,
        at: OffsetDateTime,
    ) -> Result<CaseRecord, StorageError>;
}

/// Persistence for transactional email tracking.
#[async_trait]
pub trait NotificationStore: Send + Sync + 'static {
    /// Returns `Err(StorageError::NotificationAlreadyExists)` on a duplicate message id.
    async fn create_notification(
        &self,
        record: NotificationRecord,
    ) -> Result<NotificationRecord, StorageError>;

    async fn find_notification_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<NotificationRecord>, StorageError>;

    /// Returns `Err(StorageError::NotificationNotFound)` if the message id is unknown.
    async fn update_notification(
        &self,
        message_id: &str,
        update: NotificationUpdate,
        at: OffsetDateTime,
    ) -> Result<NotificationRecord, StorageError>;
}

/// A backend providing every store the parcours engine needs.
pub trait ParcoursStorage: JourneyStore + CaseStore + NotificationStore {}

impl<T> ParcoursStorage for T where T: JourneyStore + CaseStore + NotificationStore {}
