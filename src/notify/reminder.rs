use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::data::notification::{Notification, NotificationKind, NotificationTarget};
use crate::data::task::TaskStatus;
use crate::error::EvalError;
use crate::eval::{check_id, require_class, require_task};
use crate::store::{NotificationFilter, Store, SubmissionFilter};

pub const DEFAULT_REMINDER_COOLDOWN_HOURS: i64 = 12;
pub const MAX_REMINDER_MESSAGE_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRequest {
    pub task_id: Uuid,
    pub class_id: Uuid,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReminderOutcome {
    /// Every roster member already submitted; nothing was sent.
    AllSubmitted,
    /// A reminder for the same task and class went out within the cooldown.
    #[serde(rename_all = "camelCase")]
    CooldownActive {
        last_sent_at: DateTime<Utc>,
        retry_after: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Sent {
        created_count: usize,
        skipped_count: usize,
        /// Students that received the reminder.
        student_names: Vec<String>,
    },
}

impl ReminderRequest {
    fn message(&self) -> Result<Option<&str>, EvalError> {
        let message = match self.message.as_deref().map(str::trim) {
            Some(it) => it,
            None => return Ok(None),
        };
        if message.is_empty() {
            return Err(EvalError::validation("message", "reminder message is blank"));
        }
        if message.chars().count() > MAX_REMINDER_MESSAGE_LEN {
            return Err(EvalError::validation(
                "message",
                format!(
                    "reminder message can't be longer than {} characters",
                    MAX_REMINDER_MESSAGE_LEN
                ),
            ));
        }
        Ok(Some(message))
    }
}

/// Reminds the students of a class that haven't submitted a task yet.
///
/// At most one reminder batch per (task, class) goes out within `cooldown`.
#[tracing::instrument(skip(store))]
pub async fn dispatch_reminder<S: Store>(
    store: &S,
    request: &ReminderRequest,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> Result<ReminderOutcome, EvalError> {
    check_id("task", request.task_id)?;
    check_id("class", request.class_id)?;
    let custom_message = request.message()?;

    let task = require_task(store, request.task_id).await?;
    let class = require_class(store, request.class_id).await?;
    if task.status != TaskStatus::Assigned {
        return Err(EvalError::validation("task", "task isn't assigned"));
    }
    if !task.audience.includes_class(class.id) {
        return Err(EvalError::validation(
            "class",
            format!("task {} isn't assigned to class {}", task.id, class.id),
        ));
    }

    let submitted: HashSet<Uuid> = store
        .find_submissions(&SubmissionFilter::for_task(task.id).in_class(class.id))
        .await?
        .into_iter()
        .map(|it| it.student_id)
        .collect();
    let missing: Vec<_> = class
        .roster()
        .filter(|it| !submitted.contains(&it.user_id))
        .collect();
    if missing.is_empty() {
        return Ok(ReminderOutcome::AllSubmitted);
    }

    let target = NotificationTarget::ClassTask {
        task_id: task.id,
        class_id: class.id,
    };
    let mut recent = NotificationFilter::new(NotificationKind::Reminder, target);
    recent.created_after = Some(now - cooldown);
    if let Some(last) = store.find_notifications(&recent).await?.first() {
        tracing::debug!("Reminder for task {} in class {} is cooling down", task.id, class.id);
        return Ok(ReminderOutcome::CooldownActive {
            last_sent_at: last.created_at,
            retry_after: last.created_at + cooldown,
        });
    }

    let message = match custom_message {
        Some(it) => it.to_string(),
        None => format!("Reminder: please submit your answers for \"{}\".", task.topic),
    };
    let batch = missing
        .iter()
        .map(|it| Notification::new(it.user_id, NotificationKind::Reminder, target, &message, now))
        .collect();

    let outcome = store.insert_notifications(batch).await?;
    let notified: Vec<String> = if outcome.inserted == missing.len() {
        missing.iter().map(|it| it.display_name.clone()).collect()
    } else {
        let mut sent = NotificationFilter::new(NotificationKind::Reminder, target);
        sent.receivers = Some(missing.iter().map(|it| it.user_id).collect());
        sent.created_after = Some(now);
        let receivers: HashSet<Uuid> = store
            .find_notifications(&sent)
            .await?
            .into_iter()
            .map(|it| it.receiver_id)
            .collect();
        missing
            .iter()
            .filter(|it| receivers.contains(&it.user_id))
            .map(|it| it.display_name.clone())
            .collect()
    };
    if outcome.failed > 0 {
        tracing::warn!(
            "Reminder batch for task {} in class {} incomplete: {} of {} failed",
            task.id,
            class.id,
            outcome.failed,
            missing.len()
        );
    }
    tracing::info!(
        "Sent {} reminders for task {} in class {}",
        outcome.inserted,
        task.id,
        class.id
    );

    Ok(ReminderOutcome::Sent {
        created_count: outcome.inserted,
        skipped_count: outcome.duplicates + outcome.failed,
        student_names: notified,
    })
}
