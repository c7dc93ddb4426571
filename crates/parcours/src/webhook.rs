//! Correlate transactional-email provider webhooks with sent notifications.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

use argile_storage::{NotificationRecord, NotificationStatus, NotificationUpdate, ParcoursStorage};

use crate::clock::Clock;
use crate::error::ParcoursError;

pub const EVENT_NOT_TRACKED: &str = "Événement non suivi";
pub const EMAIL_NOT_FOUND: &str = "Email non trouvé";

/// Event body posted by the email provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailWebhookPayload {
    pub event: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "message-id")]
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Event time, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_event: Option<i64>,
}

/// Provider events that change a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedEvent {
    Delivered,
    Opened,
    Click,
    SoftBounce,
    HardBounce,
}

impl TrackedEvent {
    /// `None` for events outside the allow-list.
    pub fn parse(event: &str) -> Option<TrackedEvent> {
        match event {
            "delivered" => Some(TrackedEvent::Delivered),
            "opened" | "unique_opened" => Some(TrackedEvent::Opened),
            "click" => Some(TrackedEvent::Click),
            "soft_bounce" => Some(TrackedEvent::SoftBounce),
            "hard_bounce" => Some(TrackedEvent::HardBounce),
            _ => None,
        }
    }

    fn status(self) -> NotificationStatus {
        match self {
            TrackedEvent::Delivered => NotificationStatus::Delivered,
            TrackedEvent::Opened => NotificationStatus::Opened,
            TrackedEvent::Click => NotificationStatus::Clicked,
            TrackedEvent::SoftBounce => NotificationStatus::SoftBounce,
            TrackedEvent::HardBounce => NotificationStatus::HardBounce,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookOutcome {
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookOutcome {
    fn ignored(error: &str) -> Self {
        WebhookOutcome {
            updated: false,
            error: Some(error.to_string()),
        }
    }
}

// 0 for statuses that carry no engagement signal.
fn engagement_rank(status: NotificationStatus) -> u8 {
    match status {
        NotificationStatus::Sent
        | NotificationStatus::SoftBounce
        | NotificationStatus::HardBounce => 0,
        NotificationStatus::Delivered => 1,
        NotificationStatus::Opened => 2,
        NotificationStatus::Clicked => 3,
    }
}

/// Status after `event`, or `None` when the current one must be kept.
///
/// HARD_BOUNCE is final: the address stays flagged whatever comes next.
fn next_status(current: NotificationStatus, event: TrackedEvent) -> Option<NotificationStatus> {
    if current == NotificationStatus::HardBounce {
        return None;
    }
    let candidate = event.status();
    match event {
        TrackedEvent::HardBounce => Some(candidate),
        TrackedEvent::SoftBounce => (engagement_rank(current) == 0).then_some(candidate),
        _ => (engagement_rank(candidate) > engagement_rank(current)).then_some(candidate),
    }
}

/// Build the partial update for `event` against the stored `record`.
fn build_update(
    record: &NotificationRecord,
    event: TrackedEvent,
    payload: &EmailWebhookPayload,
    at: OffsetDateTime,
) -> NotificationUpdate {
    let mut update = NotificationUpdate {
        status: next_status(record.status, event),
        ..NotificationUpdate::default()
    };
    match event {
        TrackedEvent::Delivered => {
            if record.delivered_at.is_none() {
                update.delivered_at = Some(at);
            }
        }
        TrackedEvent::Opened => {
            if record.opened_at.is_none() {
                update.opened_at = Some(at);
            }
        }
        TrackedEvent::Click => {
            update.clicked_at = Some(at);
            update.clicked_link = payload.link.clone();
        }
        TrackedEvent::SoftBounce | TrackedEvent::HardBounce => {
            update.bounced_at = Some(at);
            update.bounce_reason = payload.reason.clone();
        }
    }
    update
}

pub struct EmailTrackingService<S> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for EmailTrackingService<S> {
    fn clone(&self) -> Self {
        EmailTrackingService {
            storage: self.storage.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S: ParcoursStorage> EmailTrackingService<S> {
    pub fn new(storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        EmailTrackingService { storage, clock }
    }

    /// Record a notification as SENT so later webhook events can find it.
    pub async fn record_sent(
        &self,
        message_id: &str,
        recipient: &str,
        template: &str,
    ) -> Result<NotificationRecord, ParcoursError> {
        let record = NotificationRecord::sent(message_id, recipient, template, self.clock.now());
        Ok(self.storage.create_notification(record).await?)
    }

    /// Apply one provider event.
    ///
    /// Events outside the allow-list are acknowledged without touching the
    /// store. Status never moves back down the engagement ladder.
    pub async fn process(
        &self,
        payload: &EmailWebhookPayload,
    ) -> Result<WebhookOutcome, ParcoursError> {
        let Some(event) = TrackedEvent::parse(&payload.event) else {
            debug!(event = %payload.event, "ignoring untracked email event");
            return Ok(WebhookOutcome::ignored(EVENT_NOT_TRACKED));
        };

        let Some(record) = self
            .storage
            .find_notification_by_message_id(&payload.message_id)
            .await?
        else {
            debug!(message_id = %payload.message_id, "webhook for unknown message");
            return Ok(WebhookOutcome::ignored(EMAIL_NOT_FOUND));
        };

        let at = payload
            .ts_event
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
            .unwrap_or_else(|| self.clock.now());
        let update = build_update(&record, event, payload, at);
        let updated = self
            .storage
            .update_notification(&payload.message_id, update, self.clock.now())
            .await?;
        info!(
            message_id = %payload.message_id,
            event = %payload.event,
            status = ?updated.status,
            "email event recorded"
        );

        Ok(WebhookOutcome {
            updated: true,
            error: None,
        })
    }
}
