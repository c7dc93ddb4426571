use std::future::Future;

use super::{fixed_now, make_notification, TestResult};
use crate::{NotificationStatus, NotificationUpdate, ParcoursStorage, StorageError};

pub(super) async fn run_notification_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "notification",
        "create_then_find_by_message_id",
        create_then_find_by_message_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "notification",
        "duplicate_message_id_rejected",
        duplicate_message_id_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "notification",
        "update_applies_only_set_fields",
        update_applies_only_set_fields(factory).await,
    ));

    results
}

async fn create_then_find_by_message_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create_notification(make_notification("<msg-1@smtp-relay.example>"))
        .await
        .map_err(|e| e.to_string())?;
    let found = s
        .find_notification_by_message_id("<msg-1@smtp-relay.example>")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("notification not found")?;
    if found != created {
        return Err("stored notification differs".to_string());
    }
    if found.status != NotificationStatus::Sent {
        return Err(format!("expected SENT, got {:?}", found.status));
    }
    Ok(())
}

async fn duplicate_message_id_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_notification(make_notification("msg-dup"))
        .await
        .map_err(|e| e.to_string())?;
    match s.create_notification(make_notification("msg-dup")).await {
        Err(StorageError::NotificationAlreadyExists { message_id }) if message_id == "msg-dup" => {
            Ok(())
        }
        other => Err(format!(
            "expected NotificationAlreadyExists, got {:?}",
            other
        )),
    }
}

async fn update_applies_only_set_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParcoursStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_notification(make_notification("msg-2"))
        .await
        .map_err(|e| e.to_string())?;
    let updated = s
        .update_notification(
            "msg-2",
            NotificationUpdate {
                status: Some(NotificationStatus::HardBounce),
                bounced_at: Some(fixed_now()),
                bounce_reason: Some("mailbox does not exist".to_string()),
                ..NotificationUpdate::default()
            },
            fixed_now(),
        )
        .await
        .map_err(|e| e.to_string())?;
    if updated.status != NotificationStatus::HardBounce {
        return Err(format!("expected HARD_BOUNCE, got {:?}", updated.status));
    }
    if updated.bounce_reason.as_deref() != Some("mailbox does not exist") {
        return Err("bounce reason not stored".to_string());
    }
    if updated.delivered_at.is_some() || updated.opened_at.is_some() {
        return Err("unrelated timestamps were set".to_string());
    }
    Ok(())
}
