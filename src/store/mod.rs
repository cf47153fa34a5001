//! Storage seams used by the evaluation engine.
//!
//! Every operation is a single batch query; callers never loop over entities
//! issuing one query each.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::data::class::Class;
use crate::data::notification::{Notification, NotificationKind, NotificationTarget};
use crate::data::submission::{EvaluationStatus, Submission};
use crate::data::task::{Task, TaskStatus};
use crate::error::StoreError;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionFilter {
    pub term: Option<u32>,
    pub week: Option<u32>,
    pub task_id: Option<Uuid>,
    /// Empty matches every class.
    pub class_ids: Vec<Uuid>,
    pub student_id: Option<Uuid>,
    pub evaluation_status: Option<EvaluationStatus>,
}

impl SubmissionFilter {
    pub fn for_task(task_id: Uuid) -> SubmissionFilter {
        SubmissionFilter {
            task_id: Some(task_id),
            ..Default::default()
        }
    }

    pub fn in_class(mut self, class_id: Uuid) -> SubmissionFilter {
        self.class_ids = vec![class_id];
        self
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        self.term.map_or(true, |it| submission.term == it)
            && self.week.map_or(true, |it| submission.week == it)
            && self.task_id.map_or(true, |it| submission.task_id == it)
            && (self.class_ids.is_empty() || self.class_ids.contains(&submission.class_id))
            && self.student_id.map_or(true, |it| submission.student_id == it)
            && self
                .evaluation_status
                .map_or(true, |it| submission.evaluation_status == it)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationFilter {
    pub kind: NotificationKind,
    pub target: NotificationTarget,
    /// `None` matches every receiver.
    pub receivers: Option<Vec<Uuid>>,
    pub created_after: Option<DateTime<Utc>>,
}

impl NotificationFilter {
    pub fn new(kind: NotificationKind, target: NotificationTarget) -> NotificationFilter {
        NotificationFilter {
            kind,
            target,
            receivers: None,
            created_after: None,
        }
    }

    pub fn matches(&self, notification: &Notification) -> bool {
        notification.kind == self.kind
            && notification.target == self.target
            && self
                .receivers
                .as_ref()
                .map_or(true, |it| it.contains(&notification.receiver_id))
            && self
                .created_after
                .map_or(true, |it| notification.created_at >= it)
    }
}

/// Result of an insert-ignore-duplicate batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: usize,
    /// Rejected by the unique notification key.
    pub duplicates: usize,
    /// Rejected for any other reason.
    pub failed: usize,
}

pub trait SubmissionStore {
    async fn find_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> Result<Vec<Submission>, StoreError>;

    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError>;

    async fn count_task_submissions(&self, task_id: Uuid) -> Result<u64, StoreError>;

    /// Stores the evaluation result and marks the submission completed.
    async fn complete_evaluation(
        &self,
        id: Uuid,
        score: Option<f64>,
    ) -> Result<Option<Submission>, StoreError>;
}

pub trait TaskStore {
    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Returns the updated task, `None` if it doesn't exist.
    async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Task>, StoreError>;

    async fn find_assigned_tasks(&self) -> Result<Vec<Task>, StoreError>;

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError>;
}

pub trait DirectoryStore {
    async fn get_classes(&self, ids: &[Uuid]) -> Result<Vec<Class>, StoreError>;

    async fn school_ids(&self) -> Result<Vec<Uuid>, StoreError>;

    async fn student_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError>;

    async fn get_class(&self, id: Uuid) -> Result<Option<Class>, StoreError> {
        Ok(self.get_classes(&[id]).await?.into_iter().next())
    }
}

pub trait NotificationStore {
    async fn find_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Inserts every notification the unique `TASK` key doesn't already
    /// cover. Per-document rejections are counted, not returned as errors.
    async fn insert_notifications(
        &self,
        batch: Vec<Notification>,
    ) -> Result<BatchOutcome, StoreError>;

    /// Deletes `TASK` notifications of a task for the listed receivers only.
    async fn delete_task_notifications(
        &self,
        task_id: Uuid,
        receivers: &[Uuid],
    ) -> Result<u64, StoreError>;
}

/// Everything the engine reads and writes.
pub trait Store: SubmissionStore + TaskStore + DirectoryStore + NotificationStore {}

impl<T> Store for T where T: SubmissionStore + TaskStore + DirectoryStore + NotificationStore {}
