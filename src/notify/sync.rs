//! Keeps `TASK` notifications in line with the publish state of a task.
//!
//! An assigned task has exactly one `TASK` notification per audience member,
//! a draft task has none. The task status is persisted first; notification
//! writes that partially fail are reported, never rolled back.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{resolve_audience, MissingClasses};
use crate::data::notification::{Notification, NotificationKind, NotificationTarget};
use crate::data::task::{Task, TaskStatus};
use crate::error::{ConsistencyWarning, Entity, EvalError};
use crate::eval::{check_id, require_task};
use crate::store::{NotificationFilter, Store};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReport {
    pub task_id: Uuid,
    pub status: TaskStatus,
    /// Number of receivers the task notifies.
    pub audience: usize,
    pub created_count: usize,
    /// Receivers that already had the notification.
    pub skipped_count: usize,
    pub deleted_count: u64,
    pub warning: Option<ConsistencyWarning>,
}

impl TransitionReport {
    fn new(task: &Task, audience: usize) -> TransitionReport {
        TransitionReport {
            task_id: task.id,
            status: task.status,
            audience,
            created_count: 0,
            skipped_count: 0,
            deleted_count: 0,
            warning: None,
        }
    }
}

pub fn task_message(task: &Task) -> String {
    if task.level.is_empty() {
        format!("New task assigned: {}", task.topic)
    } else {
        format!("New task assigned: {} ({})", task.topic, task.level)
    }
}

/// Persists a new task status and synchronizes its notifications.
///
/// Publishing rejects audience classes that no longer exist. Withdrawing
/// skips them so a task can always return to draft.
#[tracing::instrument(skip(store))]
pub async fn transition_task<S: Store>(
    store: &S,
    task_id: Uuid,
    status: TaskStatus,
    now: DateTime<Utc>,
) -> Result<TransitionReport, EvalError> {
    check_id("task", task_id)?;
    let task = require_task(store, task_id).await?;
    let missing = match status {
        TaskStatus::Assigned => MissingClasses::Reject,
        TaskStatus::Draft => MissingClasses::Skip,
    };
    let audience = resolve_audience(store, &task.audience, missing).await?;

    let task = store
        .set_task_status(task_id, status)
        .await?
        .ok_or_else(|| EvalError::not_found(Entity::Task, task_id))?;
    tracing::info!("Task {} is now {}", task.id, task.status);

    synchronize(store, &task, &audience, now).await
}

/// Brings the notifications of `task` in line with its current status.
pub async fn synchronize<S: Store>(
    store: &S,
    task: &Task,
    audience: &[Uuid],
    now: DateTime<Utc>,
) -> Result<TransitionReport, EvalError> {
    match task.status {
        TaskStatus::Assigned => notify_assigned(store, task, audience, now).await,
        TaskStatus::Draft => retract_assigned(store, task, audience).await,
    }
}

/// Notifies every audience member that doesn't have the task notification
/// yet. Repeating the call for an unchanged audience creates nothing.
pub async fn notify_assigned<S: Store>(
    store: &S,
    task: &Task,
    audience: &[Uuid],
    now: DateTime<Utc>,
) -> Result<TransitionReport, EvalError> {
    let target = NotificationTarget::Task { task_id: task.id };
    let mut report = TransitionReport::new(task, audience.len());
    if audience.is_empty() {
        return Ok(report);
    }

    let mut existing_filter = NotificationFilter::new(NotificationKind::Task, target);
    existing_filter.receivers = Some(audience.to_vec());
    let notified: HashSet<Uuid> = store
        .find_notifications(&existing_filter)
        .await?
        .into_iter()
        .map(|it| it.receiver_id)
        .collect();

    let message = task_message(task);
    let batch: Vec<Notification> = audience
        .iter()
        .filter(|it| !notified.contains(it))
        .map(|receiver| Notification::new(*receiver, NotificationKind::Task, target, &message, now))
        .collect();
    let expected = batch.len();

    let outcome = store.insert_notifications(batch).await?;
    report.created_count = outcome.inserted;
    report.skipped_count = notified.len() + outcome.duplicates;

    if outcome.failed > 0 {
        let warning = ConsistencyWarning {
            task_id: task.id,
            expected,
            created: outcome.inserted,
            failed: outcome.failed,
        };
        tracing::warn!("Task notification batch incomplete: {}", warning);
        report.warning = Some(warning);
    }

    tracing::debug!(
        "Task {}: {} notifications created, {} skipped",
        task.id,
        report.created_count,
        report.skipped_count
    );
    Ok(report)
}

/// Removes the task notifications of the audience. Notifications of
/// receivers outside the audience are left alone.
pub async fn retract_assigned<S: Store>(
    store: &S,
    task: &Task,
    audience: &[Uuid],
) -> Result<TransitionReport, EvalError> {
    let mut report = TransitionReport::new(task, audience.len());
    report.deleted_count = store.delete_task_notifications(task.id, audience).await?;
    tracing::debug!("Task {}: {} notifications removed", task.id, report.deleted_count);
    Ok(report)
}

/// Deletes a task that has no submissions, together with its notifications.
#[tracing::instrument(skip(store))]
pub async fn remove_task<S: Store>(store: &S, task_id: Uuid) -> Result<Uuid, EvalError> {
    check_id("task", task_id)?;
    let task = require_task(store, task_id).await?;

    let submissions = store.count_task_submissions(task_id).await?;
    if submissions > 0 {
        return Err(EvalError::validation(
            "task",
            format!("task has {} submissions and can't be deleted", submissions),
        ));
    }

    let audience = resolve_audience(store, &task.audience, MissingClasses::Skip).await?;
    let removed = store.delete_task_notifications(task_id, &audience).await?;
    if !store.delete_task(task_id).await? {
        return Err(EvalError::not_found(Entity::Task, task_id));
    }
    tracing::info!("Deleted task {} and {} notifications", task_id, removed);

    Ok(task_id)
}
