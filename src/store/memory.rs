use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::{
    BatchOutcome, DirectoryStore, NotificationFilter, NotificationStore, SubmissionFilter,
    SubmissionStore, TaskStore,
};
use crate::data::class::{Class, School};
use crate::data::notification::{Notification, NotificationKind, NotificationTarget, RefModel};
use crate::data::submission::{EvaluationStatus, Submission};
use crate::data::task::{Task, TaskStatus};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct MemoryState {
    tasks: HashMap<Uuid, Task>,
    classes: HashMap<Uuid, Class>,
    schools: Vec<School>,
    submissions: Vec<Submission>,
    notifications: Vec<Notification>,
    /// Mirrors the unique `TASK` notification index.
    task_notification_keys: HashSet<(Uuid, Uuid, RefModel)>,

    unavailable: bool,
    rejected_receivers: HashSet<Uuid>,
}

/// In-process store for tests and local runs.
///
/// Besides plain storage it can reject notification writes for chosen
/// receivers and pretend to be unreachable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        if state.unavailable {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(state)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StoreError> {
        let state = self
            .state
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        if state.unavailable {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(state)
    }

    fn seed(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|it| it.into_inner())
    }

    pub fn insert_task(&self, task: Task) {
        self.seed().tasks.insert(task.id, task);
    }

    pub fn insert_class(&self, class: Class) {
        self.seed().classes.insert(class.id, class);
    }

    pub fn remove_class(&self, class_id: Uuid) {
        self.seed().classes.remove(&class_id);
    }

    pub fn insert_school(&self, school: School) {
        self.seed().schools.push(school);
    }

    pub fn insert_submission(&self, submission: Submission) {
        self.seed().submissions.push(submission);
    }

    /// Every stored notification, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.seed().notifications.clone()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.seed().unavailable = unavailable;
    }

    /// Makes every following notification write for `receiver` fail.
    pub fn reject_notifications_for(&self, receiver: Uuid) {
        self.seed().rejected_receivers.insert(receiver);
    }
}

impl SubmissionStore for MemoryStore {
    async fn find_submissions(
        &self,
        criteria: &SubmissionFilter,
    ) -> Result<Vec<Submission>, StoreError> {
        Ok(self
            .read()?
            .submissions
            .iter()
            .filter(|it| criteria.matches(it))
            .cloned()
            .collect())
    }

    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        Ok(self
            .read()?
            .submissions
            .iter()
            .find(|it| it.id == id)
            .cloned())
    }

    async fn count_task_submissions(&self, task_id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .read()?
            .submissions
            .iter()
            .filter(|it| it.task_id == task_id)
            .count() as u64)
    }

    async fn complete_evaluation(
        &self,
        id: Uuid,
        score: Option<f64>,
    ) -> Result<Option<Submission>, StoreError> {
        let mut state = self.write()?;
        let submission = match state.submissions.iter_mut().find(|it| it.id == id) {
            Some(it) => it,
            None => return Ok(None),
        };
        submission.evaluation_status = EvaluationStatus::Completed;
        if score.is_some() {
            submission.score = score;
        }
        Ok(Some(submission.clone()))
    }
}

impl TaskStore for MemoryStore {
    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.read()?.tasks.get(&id).cloned())
    }

    async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Task>, StoreError> {
        let mut state = self.write()?;
        Ok(state.tasks.get_mut(&id).map(|task| {
            task.status = status;
            task.clone()
        }))
    }

    async fn find_assigned_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .read()?
            .tasks
            .values()
            .filter(|it| it.status == TaskStatus::Assigned)
            .cloned()
            .collect())
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.write()?.tasks.remove(&id).is_some())
    }
}

impl DirectoryStore for MemoryStore {
    async fn get_classes(&self, ids: &[Uuid]) -> Result<Vec<Class>, StoreError> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.classes.get(id))
            .cloned()
            .collect())
    }

    async fn school_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.read()?.schools.iter().map(|it| it.id).collect())
    }

    async fn student_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        Ok(self
            .read()?
            .classes
            .values()
            .flat_map(|class| class.roster())
            .filter(|it| ids.contains(&it.user_id))
            .map(|it| (it.user_id, it.display_name.clone()))
            .collect())
    }
}

impl NotificationStore for MemoryStore {
    async fn find_notifications(
        &self,
        criteria: &NotificationFilter,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut found: Vec<Notification> = self
            .read()?
            .notifications
            .iter()
            .filter(|it| criteria.matches(it))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn insert_notifications(
        &self,
        batch: Vec<Notification>,
    ) -> Result<BatchOutcome, StoreError> {
        let mut state = self.write()?;
        let mut outcome = BatchOutcome::default();

        for notification in batch {
            if state.rejected_receivers.contains(&notification.receiver_id) {
                outcome.failed += 1;
                continue;
            }
            if let Some(key) = notification.dedup_key() {
                if !state.task_notification_keys.insert(key) {
                    outcome.duplicates += 1;
                    continue;
                }
            }
            state.notifications.push(notification);
            outcome.inserted += 1;
        }

        Ok(outcome)
    }

    async fn delete_task_notifications(
        &self,
        task_id: Uuid,
        receivers: &[Uuid],
    ) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let target = NotificationTarget::Task { task_id };
        let before = state.notifications.len();

        let MemoryState {
            notifications,
            task_notification_keys,
            ..
        } = &mut *state;
        notifications.retain(|it| {
            let matched = it.kind == NotificationKind::Task
                && it.target == target
                && receivers.contains(&it.receiver_id);
            if matched {
                if let Some(key) = it.dedup_key() {
                    task_notification_keys.remove(&key);
                }
            }
            !matched
        });

        Ok((before - state.notifications.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task_notification(task_id: Uuid, receiver: Uuid) -> Notification {
        Notification::new(
            receiver,
            NotificationKind::Task,
            NotificationTarget::Task { task_id },
            "New task",
            Utc::now(),
        )
    }

    #[rocket::async_test]
    async fn duplicate_task_notifications_are_skipped() {
        let store = MemoryStore::new();
        let task_id = Uuid::new_v4();
        let receiver = Uuid::new_v4();

        let outcome = store
            .insert_notifications(vec![
                task_notification(task_id, receiver),
                task_notification(task_id, receiver),
            ])
            .await
            .expect("store available");

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(store.notifications().len(), 1);
    }

    #[rocket::async_test]
    async fn scoped_delete_leaves_other_receivers() {
        let store = MemoryStore::new();
        let task_id = Uuid::new_v4();
        let kept = Uuid::new_v4();
        let removed = Uuid::new_v4();
        store
            .insert_notifications(vec![
                task_notification(task_id, kept),
                task_notification(task_id, removed),
            ])
            .await
            .expect("store available");

        let deleted = store
            .delete_task_notifications(task_id, &[removed])
            .await
            .expect("store available");

        assert_eq!(deleted, 1);
        let left = store.notifications();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].receiver_id, kept);

        // The deleted receiver's key is free again.
        let outcome = store
            .insert_notifications(vec![task_notification(task_id, removed)])
            .await
            .expect("store available");
        assert_eq!(outcome.inserted, 1);
    }

    #[rocket::async_test]
    async fn offline_store_fails_reads() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let result = store.get_task(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
