use argile_core::{DsStatus, JourneyStatus, Step};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One applicant's journey through the four steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyRecord {
    pub id: String,
    /// Owning applicant. One journey per applicant.
    pub applicant_id: String,
    pub current_step: Step,
    pub current_status: JourneyStatus,
    /// Eligibility simulation answers. Erasable on its own for data retention.
    pub simulation_data: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Set once the last step is validated and progression has run.
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl JourneyRecord {
    /// A fresh journey at ELIGIBILITY / TODO.
    pub fn new(applicant_id: &str, now: OffsetDateTime) -> Self {
        JourneyRecord {
            id: uuid::Uuid::new_v4().to_string(),
            applicant_id: applicant_id.to_string(),
            current_step: Step::Eligibility,
            current_status: JourneyStatus::Todo,
            simulation_data: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// The dossier backing one step of a journey on Démarches Simplifiées.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub journey_id: String,
    pub step: Step,
    /// Dossier number. `None` until the applicant submits on DS.
    pub ds_number: Option<i64>,
    /// Démarche (procedure template) the dossier belongs to.
    pub demarche_id: Option<String>,
    pub ds_status: DsStatus,
    pub ds_url: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
    /// Set exactly when the status becomes APPROVED.
    #[serde(with = "time::serde::rfc3339::option")]
    pub processed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sync_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl CaseRecord {
    /// An empty DRAFT record for `step`, not yet submitted on DS.
    pub fn draft(
        journey_id: &str,
        step: Step,
        demarche_id: Option<String>,
        now: OffsetDateTime,
    ) -> Self {
        CaseRecord {
            id: uuid::Uuid::new_v4().to_string(),
            journey_id: journey_id.to_string(),
            step,
            ds_number: None,
            demarche_id,
            ds_status: DsStatus::Draft,
            ds_url: None,
            submitted_at: None,
            processed_at: None,
            last_sync_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a [`CaseRecord`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseUpdate {
    pub ds_number: Option<i64>,
    pub demarche_id: Option<String>,
    pub ds_status: Option<DsStatus>,
    pub ds_url: Option<String>,
    pub submitted_at: Option<OffsetDateTime>,
    pub processed_at: Option<OffsetDateTime>,
    pub last_sync_at: Option<OffsetDateTime>,
}

impl CaseUpdate {
    pub fn is_empty(&self) -> bool {
        *self == CaseUpdate::default()
    }

    /// Apply the update to `record`, stamping `updated_at`.
    pub fn apply(self, record: &mut CaseRecord, now: OffsetDateTime) {
        if let Some(number) = self.ds_number {
            record.ds_number = Some(number);
        }
        if let Some(demarche_id) = self.demarche_id {
            record.demarche_id = Some(demarche_id);
        }
        if let Some(status) = self.ds_status {
            record.ds_status = status;
        }
        if let Some(url) = self.ds_url {
            record.ds_url = Some(url);
        }
        if let Some(at) = self.submitted_at {
            record.submitted_at = Some(at);
        }
        if let Some(at) = self.processed_at {
            record.processed_at = Some(at);
        }
        if let Some(at) = self.last_sync_at {
            record.last_sync_at = Some(at);
        }
        record.updated_at = now;
    }
}

/// Delivery status of a transactional email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Sent,
    Delivered,
    Opened,
    Clicked,
    SoftBounce,
    HardBounce,
}

/// A transactional email sent to an applicant, tracked through provider webhooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    /// Provider message id, used to correlate webhook events.
    pub message_id: String,
    pub recipient: String,
    pub template: String,
    pub status: NotificationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub delivered_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub opened_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub clicked_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub bounced_at: Option<OffsetDateTime>,
    pub bounce_reason: Option<String>,
    pub clicked_link: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl NotificationRecord {
    pub fn sent(message_id: &str, recipient: &str, template: &str, now: OffsetDateTime) -> Self {
        NotificationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            message_id: message_id.to_string(),
            recipient: recipient.to_string(),
            template: template.to_string(),
            status: NotificationStatus::Sent,
            sent_at: now,
            delivered_at: None,
            opened_at: None,
            clicked_at: None,
            bounced_at: None,
            bounce_reason: None,
            clicked_link: None,
            updated_at: now,
        }
    }
}

/// Partial update of a [`NotificationRecord`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationUpdate {
    pub status: Option<NotificationStatus>,
    pub delivered_at: Option<OffsetDateTime>,
    pub opened_at: Option<OffsetDateTime>,
    pub clicked_at: Option<OffsetDateTime>,
    pub bounced_at: Option<OffsetDateTime>,
    pub bounce_reason: Option<String>,
    pub clicked_link: Option<String>,
}

impl NotificationUpdate {
    pub fn apply(self, record: &mut NotificationRecord, now: OffsetDateTime) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(at) = self.delivered_at {
            record.delivered_at = Some(at);
        }
        if let Some(at) = self.opened_at {
            record.opened_at = Some(at);
        }
        if let Some(at) = self.clicked_at {
            record.clicked_at = Some(at);
        }
        if let Some(at) = self.bounced_at {
            record.bounced_at = Some(at);
        }
        if let Some(reason) = self.bounce_reason {
            record.bounce_reason = Some(reason);
        }
        if let Some(link) = self.clicked_link {
            record.clicked_link = Some(link);
        }
        record.updated_at = now;
    }
}
