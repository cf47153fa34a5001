use utoipa::ToSchema;
use uuid::Uuid;

use super::{check_id, require_task};
use crate::data::submission::{EvaluationStatus, Submission};
use crate::error::{Entity, EvalError};
use crate::store::{SubmissionStore, TaskStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub submission_id: Uuid,
    pub student_id: Uuid,
    pub task_id: Uuid,
    pub score: f64,
    pub evaluation_status: EvaluationStatus,
}

impl From<Submission> for EvaluationResult {
    fn from(value: Submission) -> Self {
        EvaluationResult {
            submission_id: value.id,
            student_id: value.student_id,
            task_id: value.task_id,
            score: value.effective_score(),
            evaluation_status: value.evaluation_status,
        }
    }
}

/// Finalizes a submission. Without a `score` the submission keeps scoring
/// by its correct answers.
#[tracing::instrument(skip(store))]
pub async fn record_evaluation<S>(
    store: &S,
    submission_id: Uuid,
    score: Option<f64>,
) -> Result<EvaluationResult, EvalError>
where
    S: SubmissionStore + TaskStore,
{
    check_id("submission", submission_id)?;

    let submission = store
        .get_submission(submission_id)
        .await?
        .ok_or_else(|| EvalError::not_found(Entity::Submission, submission_id))?;
    let task = require_task(store, submission.task_id).await?;

    if let Some(score) = score {
        if !score.is_finite() || score < 0.0 {
            return Err(EvalError::validation(
                "score",
                format!("score must be a non-negative number, got {}", score),
            ));
        }
        if score > f64::from(task.total_questions) {
            return Err(EvalError::validation(
                "score",
                format!(
                    "score {} exceeds the task's {} questions",
                    score, task.total_questions
                ),
            ));
        }
    }

    let evaluated = store
        .complete_evaluation(submission_id, score)
        .await?
        .ok_or_else(|| EvalError::not_found(Entity::Submission, submission_id))?;
    tracing::info!("Evaluated submission {}", submission_id);

    Ok(evaluated.into())
}
