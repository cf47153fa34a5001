use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::eval::evaluation::{record_evaluation, EvaluationResult};
use crate::resp::problem::Problem;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EvaluationBody {
    /// Teacher-assigned score. Omit it to score by correct answers.
    #[serde(default)]
    pub score: Option<f64>,
}

/// Finalize the evaluation of a submission
#[utoipa::path(
    request_body = EvaluationBody,
    params(
        ("id", description = "submission ID")
    ),
    responses(
        (status = 200, description = "Evaluated submission", body = EvaluationResult),
        (status = 400, description = "Score exceeds the task's question count", body = Problem),
        (status = 404, description = "Submission or its task doesn't exist", body = Problem),
    )
)]
#[put("/submission/<id>/evaluation", format = "application/json", data = "<body>")]
#[tracing::instrument(skip(db))]
pub async fn submission_evaluate(
    id: Uuid,
    body: Json<EvaluationBody>,
    db: &State<Database>,
) -> Result<Json<EvaluationResult>, Problem> {
    let result = record_evaluation(db.inner(), id, body.score)
        .await
        .map_err(Problem::from)?;
    Ok(Json(result))
}
