use std::collections::BTreeMap;

use utoipa::ToSchema;
use uuid::Uuid;

use super::{check_id, require_class, require_task};
use crate::data::submission::Submission;
use crate::error::EvalError;
use crate::store::{DirectoryStore, SubmissionFilter, SubmissionStore, TaskStore};

/// When a question counts as a common mistake.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MistakePolicy {
    /// Questions answered correctly by strictly less than this share are flagged.
    pub threshold: f64,
    /// Questions with fewer attempts are never flagged.
    pub min_attempts: Option<u32>,
}

/// The one mistake policy used unless a deployment or request overrides it.
pub const DEFAULT_MISTAKE_POLICY: MistakePolicy = MistakePolicy {
    threshold: 0.6,
    min_attempts: None,
};

impl Default for MistakePolicy {
    fn default() -> Self {
        DEFAULT_MISTAKE_POLICY
    }
}

impl MistakePolicy {
    pub fn validate(&self) -> Result<(), EvalError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(EvalError::validation(
                "threshold",
                format!("must be in (0, 1], got {}", self.threshold),
            ));
        }
        Ok(())
    }

    pub fn flags(&self, question: &QuestionAccuracy) -> bool {
        let enough_attempts = self
            .min_attempts
            .map_or(true, |min| question.total_attempts >= min);
        enough_attempts && question.accuracy < self.threshold
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAccuracy {
    pub question_id: Uuid,
    pub correct_count: u32,
    pub total_attempts: u32,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MistakeReport {
    pub task_id: Uuid,
    pub class_id: Option<Uuid>,
    pub policy: MistakePolicy,
    pub questions_evaluated: usize,
    pub flagged_count: usize,
    /// Lowest accuracy first.
    pub flagged: Vec<QuestionAccuracy>,
}

/// Per-question accuracy over every answer in `submissions`, ordered by
/// question id.
pub fn tally<'a>(submissions: impl IntoIterator<Item = &'a Submission>) -> Vec<QuestionAccuracy> {
    let mut counts: BTreeMap<Uuid, (u32, u32)> = BTreeMap::new();

    for answer in submissions.into_iter().flat_map(|it| &it.answers) {
        let count = counts.entry(answer.question_id).or_default();
        count.0 += u32::from(answer.is_correct);
        count.1 += 1;
    }

    counts
        .into_iter()
        .map(|(question_id, (correct_count, total_attempts))| QuestionAccuracy {
            question_id,
            correct_count,
            total_attempts,
            accuracy: f64::from(correct_count) / f64::from(total_attempts),
        })
        .collect()
}

pub fn detect(
    task_id: Uuid,
    class_id: Option<Uuid>,
    submissions: &[Submission],
    policy: MistakePolicy,
) -> MistakeReport {
    let questions = tally(submissions);
    let questions_evaluated = questions.len();

    let mut flagged: Vec<QuestionAccuracy> =
        questions.into_iter().filter(|it| policy.flags(it)).collect();
    flagged.sort_by(|a, b| {
        a.accuracy
            .total_cmp(&b.accuracy)
            .then_with(|| b.total_attempts.cmp(&a.total_attempts))
            .then_with(|| a.question_id.cmp(&b.question_id))
    });

    MistakeReport {
        task_id,
        class_id,
        policy,
        questions_evaluated,
        flagged_count: flagged.len(),
        flagged,
    }
}

/// Flags the questions of a task that were answered poorly, optionally
/// restricted to one class. Answers count regardless of evaluation status.
#[tracing::instrument(skip(store))]
pub async fn detect_mistakes<S>(
    store: &S,
    task_id: Uuid,
    class_id: Option<Uuid>,
    policy: MistakePolicy,
) -> Result<MistakeReport, EvalError>
where
    S: SubmissionStore + TaskStore + DirectoryStore,
{
    check_id("task", task_id)?;
    if let Some(class_id) = class_id {
        check_id("class", class_id)?;
    }
    policy.validate()?;

    require_task(store, task_id).await?;
    let mut filter = SubmissionFilter::for_task(task_id);
    if let Some(class_id) = class_id {
        require_class(store, class_id).await?;
        filter = filter.in_class(class_id);
    }

    let submissions = store.find_submissions(&filter).await?;
    let report = detect(task_id, class_id, &submissions, policy);
    tracing::debug!(
        "Flagged {} of {} questions",
        report.flagged_count,
        report.questions_evaluated
    );

    Ok(report)
}
