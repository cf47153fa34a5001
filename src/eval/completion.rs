use std::collections::HashMap;

use utoipa::ToSchema;
use uuid::Uuid;

use super::{check_id, require_class, require_classes, require_task};
use crate::data::class::Class;
use crate::data::submission::Submission;
use crate::data::task::TaskAudience;
use crate::error::EvalError;
use crate::store::{DirectoryStore, SubmissionFilter, SubmissionStore, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletionState {
    pub task_id: Uuid,
    pub class_id: Uuid,
    pub received_count: usize,
    pub pending_count: usize,
    pub roster_size: usize,
    /// Share of the roster that submitted, `0.0` for an empty roster.
    pub submission_rate: f64,
    pub status: CompletionStatus,
}

impl CompletionState {
    pub fn from_counts(
        task_id: Uuid,
        class_id: Uuid,
        received_count: usize,
        pending_count: usize,
        roster_size: usize,
    ) -> CompletionState {
        if roster_size == 0 {
            return CompletionState {
                task_id,
                class_id,
                received_count: 0,
                pending_count: 0,
                roster_size,
                submission_rate: 0.0,
                status: CompletionStatus::Pending,
            };
        }

        let status = if received_count > 0 && pending_count == 0 {
            CompletionStatus::Completed
        } else {
            CompletionStatus::Pending
        };

        CompletionState {
            task_id,
            class_id,
            received_count,
            pending_count,
            roster_size,
            submission_rate: received_count as f64 / roster_size as f64,
            status,
        }
    }

    pub fn completed(&self) -> bool {
        self.status == CompletionStatus::Completed
    }
}

/// Classifies one (task, class) pair from the class' submissions for the task.
pub fn classify<'a>(
    task_id: Uuid,
    class: &Class,
    submissions: impl IntoIterator<Item = &'a Submission>,
) -> CompletionState {
    let (received, pending) = submissions
        .into_iter()
        .filter(|it| it.task_id == task_id && it.class_id == class.id)
        .fold((0, 0), |(received, pending), it| {
            (received + 1, pending + usize::from(it.is_pending()))
        });

    CompletionState::from_counts(task_id, class.id, received, pending, class.roster_size())
}

#[tracing::instrument(skip(store))]
pub async fn classify_class<S>(
    store: &S,
    task_id: Uuid,
    class_id: Uuid,
) -> Result<CompletionState, EvalError>
where
    S: SubmissionStore + TaskStore + DirectoryStore,
{
    check_id("task", task_id)?;
    check_id("class", class_id)?;
    require_task(store, task_id).await?;
    let class = require_class(store, class_id).await?;

    let submissions = store
        .find_submissions(&SubmissionFilter::for_task(task_id).in_class(class_id))
        .await?;

    Ok(classify(task_id, &class, &submissions))
}

/// Classifies a task for several classes with a single submission query.
/// States keep the order of `class_ids`.
///
/// An empty `class_ids` means the classes of the task audience; classes of
/// the audience that no longer exist are left out.
#[tracing::instrument(skip(store))]
pub async fn classify_classes<S>(
    store: &S,
    task_id: Uuid,
    class_ids: &[Uuid],
) -> Result<Vec<CompletionState>, EvalError>
where
    S: SubmissionStore + TaskStore + DirectoryStore,
{
    check_id("task", task_id)?;
    for id in class_ids {
        check_id("class", *id)?;
    }
    let task = require_task(store, task_id).await?;

    let (class_ids, classes) = if class_ids.is_empty() {
        let audience = match &task.audience {
            TaskAudience::Classes { class_ids } => class_ids.clone(),
            TaskAudience::Schools => vec![],
        };
        let classes = store.get_classes(&audience).await?;
        (audience, classes)
    } else {
        (class_ids.to_vec(), require_classes(store, class_ids).await?)
    };
    if classes.is_empty() {
        return Ok(vec![]);
    }

    let submissions = store
        .find_submissions(&SubmissionFilter {
            task_id: Some(task_id),
            class_ids: classes.iter().map(|it| it.id).collect(),
            ..Default::default()
        })
        .await?;

    let mut by_class: HashMap<Uuid, Vec<&Submission>> = HashMap::new();
    for submission in &submissions {
        by_class.entry(submission.class_id).or_default().push(submission);
    }

    let classes: HashMap<Uuid, &Class> = classes.iter().map(|it| (it.id, it)).collect();
    Ok(class_ids
        .iter()
        .filter_map(|id| classes.get(id))
        .map(|class| {
            let class_submissions = by_class.get(&class.id).map(Vec::as_slice).unwrap_or(&[]);
            classify(task_id, class, class_submissions.iter().copied())
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub class_id: Uuid,
    pub completed: usize,
    pub pending: usize,
    pub total_tasks: usize,
}

/// Counts completed and pending tasks of a class over every assigned task
/// whose audience includes it.
#[tracing::instrument(skip(store))]
pub async fn summarize_class<S>(store: &S, class_id: Uuid) -> Result<CompletionSummary, EvalError>
where
    S: SubmissionStore + TaskStore + DirectoryStore,
{
    check_id("class", class_id)?;
    let class = require_class(store, class_id).await?;

    let tasks: Vec<Uuid> = store
        .find_assigned_tasks()
        .await?
        .into_iter()
        .filter(|it| it.audience.includes_class(class_id))
        .map(|it| it.id)
        .collect();

    let submissions = store
        .find_submissions(&SubmissionFilter::default().in_class(class_id))
        .await?;

    let completed = tasks
        .iter()
        .map(|task_id| classify(*task_id, &class, &submissions))
        .filter(CompletionState::completed)
        .count();

    Ok(CompletionSummary {
        class_id,
        completed,
        pending: tasks.len() - completed,
        total_tasks: tasks.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::class::ClassParticipant;
    use crate::data::submission::EvaluationStatus;
    use crate::data::task::{Task, TaskStatus};
    use crate::error::Entity;
    use crate::store::MemoryStore;

    fn class_with_students(count: usize) -> Class {
        let mut class = Class::new("6c");
        class.participants = (0..count)
            .map(|i| ClassParticipant::student(Uuid::new_v4(), format!("Student {}", i)))
            .collect();
        class
    }

    fn submitted(class: &Class, task_id: Uuid, status: EvaluationStatus) -> Submission {
        let mut submission = Submission::new(Uuid::new_v4(), task_id, class.id);
        submission.evaluation_status = status;
        submission
    }

    #[test]
    fn no_submissions_is_pending() {
        let class = class_with_students(3);
        let state = classify(Uuid::new_v4(), &class, &[]);

        assert_eq!(state.received_count, 0);
        assert_eq!(state.status, CompletionStatus::Pending);
    }

    #[test]
    fn empty_roster_never_completes() {
        let class = class_with_students(0);
        let task_id = Uuid::new_v4();
        let submissions = vec![submitted(&class, task_id, EvaluationStatus::Completed)];

        let state = classify(task_id, &class, &submissions);
        assert!(!state.completed());
        assert_eq!(state.received_count, 0);
        assert_eq!(state.submission_rate, 0.0);
    }

    #[test]
    fn pending_submission_reopens_completed_pair() {
        let class = class_with_students(3);
        let task_id = Uuid::new_v4();
        let mut submissions = vec![submitted(&class, task_id, EvaluationStatus::Completed)];
        assert!(classify(task_id, &class, &submissions).completed());

        submissions.push(submitted(&class, task_id, EvaluationStatus::Pending));
        let state = classify(task_id, &class, &submissions);
        assert!(!state.completed());
        assert_eq!(state.pending_count, 1);
    }

    #[test]
    fn first_evaluated_submission_completes_pair() {
        let class = class_with_students(2);
        let task_id = Uuid::new_v4();
        assert!(!classify(task_id, &class, &[]).completed());

        let submissions = vec![submitted(&class, task_id, EvaluationStatus::Completed)];
        let state = classify(task_id, &class, &submissions);
        assert!(state.completed());
        assert_eq!(state.submission_rate, 0.5);
    }

    #[test]
    fn first_pending_submission_stays_pending() {
        let class = class_with_students(2);
        let task_id = Uuid::new_v4();
        let submissions = vec![submitted(&class, task_id, EvaluationStatus::Pending)];

        assert!(!classify(task_id, &class, &submissions).completed());
    }

    #[rocket::async_test]
    async fn batch_classification_keeps_requested_order() {
        let store = MemoryStore::new();
        let task = Task::new("Verbs", 4, TaskAudience::Schools);
        let task_id = task.id;
        store.insert_task(task);

        let done = class_with_students(1);
        let open = class_with_students(1);
        store.insert_submission(submitted(&done, task_id, EvaluationStatus::Completed));
        store.insert_submission(submitted(&open, task_id, EvaluationStatus::Pending));
        let (done_id, open_id) = (done.id, open.id);
        store.insert_class(done);
        store.insert_class(open);

        let states = classify_classes(&store, task_id, &[open_id, done_id])
            .await
            .expect("classification succeeds");

        assert_eq!(states.len(), 2);
        assert_eq!(states[0].class_id, open_id);
        assert_eq!(states[0].status, CompletionStatus::Pending);
        assert_eq!(states[1].class_id, done_id);
        assert_eq!(states[1].status, CompletionStatus::Completed);
    }

    #[rocket::async_test]
    async fn batch_with_unknown_class_is_not_found() {
        let store = MemoryStore::new();
        let task = Task::new("Verbs", 4, TaskAudience::Schools);
        let task_id = task.id;
        store.insert_task(task);
        let missing = Uuid::new_v4();

        let result = classify_classes(&store, task_id, &[missing]).await;
        assert!(matches!(
            result,
            Err(EvalError::NotFound { entity: Entity::Class, .. })
        ));
    }

    #[rocket::async_test]
    async fn empty_batch_for_unknown_task_is_not_found() {
        let result = classify_classes(&MemoryStore::new(), Uuid::new_v4(), &[]).await;
        assert!(matches!(
            result,
            Err(EvalError::NotFound { entity: Entity::Task, .. })
        ));
    }

    #[rocket::async_test]
    async fn empty_batch_covers_task_audience() {
        let store = MemoryStore::new();
        let first = class_with_students(2);
        let second = class_with_students(1);
        let (first_id, second_id) = (first.id, second.id);
        let task = Task::new("Fractions", 3, TaskAudience::Classes {
            class_ids: vec![second_id, first_id, Uuid::new_v4()],
        });
        let task_id = task.id;
        store.insert_submission(submitted(&first, task_id, EvaluationStatus::Completed));
        store.insert_task(task);
        store.insert_class(first);
        store.insert_class(second);

        let states = classify_classes(&store, task_id, &[])
            .await
            .expect("classification succeeds");

        let order: Vec<Uuid> = states.iter().map(|it| it.class_id).collect();
        assert_eq!(order, vec![second_id, first_id]);
        assert_eq!(states[1].status, CompletionStatus::Completed);
        assert_eq!(states[0].received_count, 0);
    }

    #[rocket::async_test]
    async fn school_task_without_classes_is_empty() {
        let store = MemoryStore::new();
        let task = Task::new("Verbs", 4, TaskAudience::Schools);
        let task_id = task.id;
        store.insert_task(task);

        let states = classify_classes(&store, task_id, &[])
            .await
            .expect("classification succeeds");
        assert!(states.is_empty());
    }

    #[rocket::async_test]
    async fn summary_counts_assigned_tasks_of_class() {
        let store = MemoryStore::new();
        let class = class_with_students(2);
        let class_id = class.id;

        let mut finished = Task::new("Finished", 2, TaskAudience::Classes {
            class_ids: vec![class_id],
        });
        finished.status = TaskStatus::Assigned;
        let mut open = Task::new("Open", 2, TaskAudience::Schools);
        open.status = TaskStatus::Assigned;
        let mut other_class = Task::new("Elsewhere", 2, TaskAudience::Classes {
            class_ids: vec![Uuid::new_v4()],
        });
        other_class.status = TaskStatus::Assigned;
        let draft = Task::new("Draft", 2, TaskAudience::Schools);

        store.insert_submission(submitted(&class, finished.id, EvaluationStatus::Completed));
        store.insert_submission(submitted(&class, open.id, EvaluationStatus::Pending));
        store.insert_task(finished);
        store.insert_task(open);
        store.insert_task(other_class);
        store.insert_task(draft);
        store.insert_class(class);

        let summary = summarize_class(&store, class_id)
            .await
            .expect("summary succeeds");
        assert_eq!(
            summary,
            CompletionSummary {
                class_id,
                completed: 1,
                pending: 1,
                total_tasks: 2,
            }
        );
    }
}
