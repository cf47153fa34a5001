use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::eval::completion::{summarize_class, CompletionSummary};
use crate::resp::problem::Problem;

/// Completed and pending task counts of a class
#[utoipa::path(
    params(
        ("id", description = "class ID")
    ),
    responses(
        (status = 200, description = "Completion over every assigned task of the class", body = CompletionSummary),
        (status = 400, description = "Malformed identifier", body = Problem),
        (status = 404, description = "Class doesn't exist", body = Problem),
    )
)]
#[get("/class/<id>/completion")]
#[tracing::instrument(skip(db))]
pub async fn class_completion(
    id: Uuid,
    db: &State<Database>,
) -> Result<Json<CompletionSummary>, Problem> {
    let summary = summarize_class(db.inner(), id)
        .await
        .map_err(Problem::from)?;
    Ok(Json(summary))
}
