use std::collections::BTreeMap;

use utoipa::ToSchema;
use uuid::Uuid;

use super::{check_id, check_term, check_week, require_class, require_task};
use crate::data::submission::{EvaluationStatus, Submission};
use crate::error::EvalError;
use crate::store::{DirectoryStore, SubmissionFilter, SubmissionStore, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    Student,
    Class,
}

impl Default for Grouping {
    fn default() -> Self {
        Grouping::Student
    }
}

impl Grouping {
    fn key(self, submission: &Submission) -> Uuid {
        match self {
            Grouping::Student => submission.student_id,
            Grouping::Class => submission.class_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreQuery {
    pub term: Option<u32>,
    pub week: Option<u32>,
    pub task_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub evaluation_status: Option<EvaluationStatus>,
    pub grouping: Grouping,
}

impl ScoreQuery {
    pub fn validate(&self) -> Result<(), EvalError> {
        if let Some(term) = self.term {
            check_term(term)?;
        }
        if let Some(week) = self.week {
            check_week(week)?;
        }
        if let Some(id) = self.task_id {
            check_id("task", id)?;
        }
        if let Some(id) = self.class_id {
            check_id("class", id)?;
        }
        if let Some(id) = self.student_id {
            check_id("student", id)?;
        }
        Ok(())
    }

    pub fn submission_filter(&self) -> SubmissionFilter {
        SubmissionFilter {
            term: self.term,
            week: self.week,
            task_id: self.task_id,
            class_ids: self.class_id.into_iter().collect(),
            student_id: self.student_id,
            evaluation_status: self.evaluation_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub entity_id: Uuid,
    pub aggregate_score: f64,
    pub submission_count: usize,
}

/// Sums [`Submission::effective_score`] per grouping key. Entries are
/// ordered by entity id.
pub fn aggregate(submissions: &[Submission], grouping: Grouping) -> Vec<ScoreEntry> {
    let mut totals: BTreeMap<Uuid, (f64, usize)> = BTreeMap::new();

    for submission in submissions {
        let total = totals.entry(grouping.key(submission)).or_default();
        total.0 += submission.effective_score();
        total.1 += 1;
    }

    totals
        .into_iter()
        .map(|(entity_id, (aggregate_score, submission_count))| ScoreEntry {
            entity_id,
            aggregate_score,
            submission_count,
        })
        .collect()
}

/// Aggregates scores of every submission matching `query`.
///
/// A task or class named by the query must exist; an existing target without
/// submissions yields an empty list.
#[tracing::instrument(skip(store))]
pub async fn aggregate_scores<S>(store: &S, query: &ScoreQuery) -> Result<Vec<ScoreEntry>, EvalError>
where
    S: SubmissionStore + TaskStore + DirectoryStore,
{
    query.validate()?;

    if let Some(task_id) = query.task_id {
        require_task(store, task_id).await?;
    }
    if let Some(class_id) = query.class_id {
        require_class(store, class_id).await?;
    }

    let submissions = store.find_submissions(&query.submission_filter()).await?;
    tracing::debug!("Aggregating {} submissions", submissions.len());

    Ok(aggregate(&submissions, query.grouping))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::class::Class;
    use crate::data::submission::Answer;
    use crate::data::task::{Task, TaskAudience};
    use crate::error::Entity;
    use crate::store::MemoryStore;

    fn submission(student: Uuid, class: Uuid, task: Uuid, correct: u32, total: u32) -> Submission {
        let mut submission = Submission::new(student, task, class);
        submission.answers = (0..total)
            .map(|i| Answer::new(Uuid::new_v4(), i < correct))
            .collect();
        submission
    }

    #[test]
    fn sums_per_student() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let class = Uuid::new_v4();
        let submissions = vec![
            submission(a, class, Uuid::new_v4(), 3, 5),
            submission(a, class, Uuid::new_v4(), 4, 5),
            submission(b, class, Uuid::new_v4(), 1, 5),
        ];

        let entries = aggregate(&submissions, Grouping::Student);
        let a_entry = entries.iter().find(|it| it.entity_id == a).expect("a present");
        let b_entry = entries.iter().find(|it| it.entity_id == b).expect("b present");

        assert_eq!(a_entry.aggregate_score, 7.0);
        assert_eq!(a_entry.submission_count, 2);
        assert_eq!(b_entry.aggregate_score, 1.0);
    }

    #[test]
    fn groups_by_class_and_prefers_stored_score() {
        let class = Uuid::new_v4();
        let mut graded = submission(Uuid::new_v4(), class, Uuid::new_v4(), 5, 5);
        graded.score = Some(2.0);
        let ungraded = submission(Uuid::new_v4(), class, Uuid::new_v4(), 3, 5);

        let entries = aggregate(&[graded, ungraded], Grouping::Class);
        assert_eq!(
            entries,
            vec![ScoreEntry {
                entity_id: class,
                aggregate_score: 5.0,
                submission_count: 2,
            }]
        );
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(aggregate(&[], Grouping::Student).is_empty());
    }

    #[rocket::async_test]
    async fn existing_task_without_submissions_is_empty_not_error() {
        let store = MemoryStore::new();
        let task = Task::new("Fractions", 5, TaskAudience::Schools);
        let task_id = task.id;
        store.insert_task(task);

        let entries = aggregate_scores(
            &store,
            &ScoreQuery {
                task_id: Some(task_id),
                ..Default::default()
            },
        )
        .await
        .expect("aggregation succeeds");
        assert!(entries.is_empty());
    }

    #[rocket::async_test]
    async fn unknown_class_is_not_found() {
        let store = MemoryStore::new();
        let missing = Uuid::new_v4();

        let result = aggregate_scores(
            &store,
            &ScoreQuery {
                class_id: Some(missing),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(EvalError::NotFound { entity: Entity::Class, id }) if id == missing
        ));
    }

    #[rocket::async_test]
    async fn filters_by_week_and_class() {
        let store = MemoryStore::new();
        let class = Class::new("5a");
        let class_id = class.id;
        store.insert_class(class);

        let student = Uuid::new_v4();
        let mut week_two = submission(student, class_id, Uuid::new_v4(), 2, 3);
        week_two.week = 2;
        let mut week_three = submission(student, class_id, Uuid::new_v4(), 3, 3);
        week_three.week = 3;
        let mut elsewhere = submission(student, Uuid::new_v4(), Uuid::new_v4(), 3, 3);
        elsewhere.week = 2;
        store.insert_submission(week_two);
        store.insert_submission(week_three);
        store.insert_submission(elsewhere);

        let entries = aggregate_scores(
            &store,
            &ScoreQuery {
                week: Some(2),
                class_id: Some(class_id),
                ..Default::default()
            },
        )
        .await
        .expect("aggregation succeeds");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].aggregate_score, 2.0);
    }

    #[rocket::async_test]
    async fn malformed_week_is_rejected_before_store_access() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let result = aggregate_scores(
            &store,
            &ScoreQuery {
                week: Some(60),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(EvalError::Validation { field: "week", .. })));
    }
}
