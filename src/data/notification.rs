use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub enum NotificationKind {
    #[serde(rename = "TASK")]
    Task,
    #[serde(rename = "reminder")]
    Reminder,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Task => "TASK",
            NotificationKind::Reminder => "reminder",
        }
    }
}

/// Entity a notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationTarget {
    Task { task_id: Uuid },
    /// A task in the context of a single class.
    ClassTask { task_id: Uuid, class_id: Uuid },
}

impl NotificationTarget {
    pub fn task_id(&self) -> Uuid {
        match self {
            NotificationTarget::Task { task_id } => *task_id,
            NotificationTarget::ClassTask { task_id, .. } => *task_id,
        }
    }

    pub fn class_id(&self) -> Option<Uuid> {
        match self {
            NotificationTarget::Task { .. } => None,
            NotificationTarget::ClassTask { class_id, .. } => Some(*class_id),
        }
    }

    pub fn ref_model(&self) -> RefModel {
        match self {
            NotificationTarget::Task { .. } => RefModel::Task,
            NotificationTarget::ClassTask { .. } => RefModel::ClassTask,
        }
    }
}

/// Persisted discriminator of [`NotificationTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefModel {
    Task,
    ClassTask,
}

impl RefModel {
    pub fn as_str(self) -> &'static str {
        match self {
            RefModel::Task => "Task",
            RefModel::ClassTask => "ClassTask",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub receiver_id: Uuid,
    pub kind: NotificationKind,
    pub target: NotificationTarget,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        receiver_id: Uuid,
        kind: NotificationKind,
        target: NotificationTarget,
        message: impl ToString,
        created_at: DateTime<Utc>,
    ) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            receiver_id,
            kind,
            target,
            message: message.to_string(),
            is_read: false,
            created_at,
        }
    }

    /// Key of the unique `TASK` notification index.
    pub fn dedup_key(&self) -> Option<(Uuid, Uuid, RefModel)> {
        match self.kind {
            NotificationKind::Task => {
                Some((self.target.task_id(), self.receiver_id, self.target.ref_model()))
            }
            NotificationKind::Reminder => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("notification '{0}' has refModel 'ClassTask' but no refClass")]
pub struct MissingRefClass(Uuid);

/// Document layout of a notification in the `notifications` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub receiver_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub ref_id: Uuid,
    pub ref_model: RefModel,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "super::uuid_binary::option"
    )]
    pub ref_class: Option<Uuid>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationRecord {
    fn from(value: Notification) -> Self {
        NotificationRecord {
            id: value.id,
            receiver_id: value.receiver_id,
            kind: value.kind,
            ref_id: value.target.task_id(),
            ref_model: value.target.ref_model(),
            ref_class: value.target.class_id(),
            message: value.message,
            is_read: value.is_read,
            created_at: value.created_at,
        }
    }
}

impl TryFrom<NotificationRecord> for Notification {
    type Error = MissingRefClass;

    fn try_from(value: NotificationRecord) -> Result<Self, Self::Error> {
        let target = match value.ref_model {
            RefModel::Task => NotificationTarget::Task {
                task_id: value.ref_id,
            },
            RefModel::ClassTask => NotificationTarget::ClassTask {
                task_id: value.ref_id,
                class_id: value.ref_class.ok_or(MissingRefClass(value.id))?,
            },
        };

        Ok(Notification {
            id: value.id,
            receiver_id: value.receiver_id,
            kind: value.kind,
            target,
            message: value.message,
            is_read: value.is_read,
            created_at: value.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_task_record_keeps_class() {
        let task_id = Uuid::new_v4();
        let class_id = Uuid::new_v4();
        let notification = Notification::new(
            Uuid::new_v4(),
            NotificationKind::Reminder,
            NotificationTarget::ClassTask { task_id, class_id },
            "Please submit",
            Utc::now(),
        );

        let record = NotificationRecord::from(notification.clone());
        assert_eq!(record.ref_model, RefModel::ClassTask);
        assert_eq!(record.ref_id, task_id);
        assert_eq!(record.ref_class, Some(class_id));

        let back = Notification::try_from(record).expect("valid record");
        assert_eq!(back.target, notification.target);
    }

    #[test]
    fn class_task_record_without_class_is_rejected() {
        let record = NotificationRecord {
            id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            kind: NotificationKind::Reminder,
            ref_id: Uuid::new_v4(),
            ref_model: RefModel::ClassTask,
            ref_class: None,
            message: String::new(),
            is_read: false,
            created_at: Utc::now(),
        };

        assert!(Notification::try_from(record).is_err());
    }

    #[test]
    fn only_task_notifications_are_deduplicated() {
        let task_id = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let task = Notification::new(
            receiver,
            NotificationKind::Task,
            NotificationTarget::Task { task_id },
            "",
            Utc::now(),
        );
        let reminder = Notification::new(
            receiver,
            NotificationKind::Reminder,
            NotificationTarget::ClassTask {
                task_id,
                class_id: Uuid::new_v4(),
            },
            "",
            Utc::now(),
        );

        assert_eq!(task.dedup_key(), Some((task_id, receiver, RefModel::Task)));
        assert_eq!(reminder.dedup_key(), None);
    }
}
