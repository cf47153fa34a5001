use chrono::Utc;
use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::data::task::TaskStatus;
use crate::eval::completion::{classify_classes, CompletionState};
use crate::eval::mistakes::{detect_mistakes, MistakePolicy, MistakeReport};
use crate::notify::reminder::{dispatch_reminder, ReminderOutcome, ReminderRequest};
use crate::notify::sync::{remove_task, transition_task, TransitionReport};
use crate::resp::problem::Problem;

/// Completion state of a task for a batch of classes
#[utoipa::path(
    params(
        ("id", description = "task ID"),
        ("class" = Vec<Uuid>, Query, description = "class IDs, repeated per class; omit for the classes of the task audience"),
    ),
    responses(
        (status = 200, description = "Completion states in requested order", body = Vec<CompletionState>),
        (status = 400, description = "Malformed identifier", body = Problem),
        (status = 404, description = "Task or one of the classes doesn't exist", body = Problem),
    )
)]
#[get("/task/<id>/completion?<class>")]
#[tracing::instrument(skip(db))]
pub async fn task_completion(
    id: Uuid,
    class: Vec<Uuid>,
    db: &State<Database>,
) -> Result<Json<Vec<CompletionState>>, Problem> {
    let states = classify_classes(db.inner(), id, &class)
        .await
        .map_err(Problem::from)?;
    Ok(Json(states))
}

/// Questions of a task answered poorly
#[utoipa::path(
    params(
        ("id", description = "task ID"),
        ("class" = Option<Uuid>, Query, description = "restrict to one class"),
        ("threshold" = Option<f64>, Query, description = "flag questions below this accuracy"),
        ("min_attempts" = Option<u32>, Query, description = "ignore questions with fewer attempts"),
    ),
    responses(
        (status = 200, description = "Flagged questions, lowest accuracy first", body = MistakeReport),
        (status = 400, description = "Malformed identifier or threshold", body = Problem),
        (status = 404, description = "Task or class doesn't exist", body = Problem),
    )
)]
#[get("/task/<id>/mistakes?<class>&<threshold>&<min_attempts>")]
#[tracing::instrument(skip(db, c))]
pub async fn task_mistakes(
    id: Uuid,
    class: Option<Uuid>,
    threshold: Option<f64>,
    min_attempts: Option<u32>,
    db: &State<Database>,
    c: &State<Config>,
) -> Result<Json<MistakeReport>, Problem> {
    let defaults = c.evaluation.mistake_policy();
    let policy = MistakePolicy {
        threshold: threshold.unwrap_or(defaults.threshold),
        min_attempts: min_attempts.or(defaults.min_attempts),
    };

    let report = detect_mistakes(db.inner(), id, class, policy)
        .await
        .map_err(Problem::from)?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChange {
    pub status: TaskStatus,
}

/// Publish or withdraw a task
///
/// Notifications of the task audience follow the new status.
#[utoipa::path(
    request_body = StatusChange,
    params(
        ("id", description = "task ID")
    ),
    responses(
        (status = 200, description = "Notification changes caused by the transition", body = TransitionReport),
        (status = 400, description = "Malformed identifier", body = Problem),
        (status = 404, description = "Task or an audience class doesn't exist", body = Problem),
    )
)]
#[put("/task/<id>/status", format = "application/json", data = "<change>")]
#[tracing::instrument(skip(db))]
pub async fn task_status(
    id: Uuid,
    change: Json<StatusChange>,
    db: &State<Database>,
) -> Result<Json<TransitionReport>, Problem> {
    let report = transition_task(db.inner(), id, change.status, Utc::now())
        .await
        .map_err(Problem::from)?;
    Ok(Json(report))
}

/// Delete a task
#[utoipa::path(
    params(
        ("id", description = "task ID")
    ),
    responses(
        (status = 200, description = "ID of the deleted task", body = String),
        (status = 400, description = "Task already has submissions", body = Problem),
        (status = 404, description = "Task doesn't exist", body = Problem),
    )
)]
#[delete("/task/<id>")]
#[tracing::instrument(skip(db))]
pub async fn task_delete(id: Uuid, db: &State<Database>) -> Result<String, Problem> {
    let deleted = remove_task(db.inner(), id).await.map_err(Problem::from)?;
    Ok(deleted.to_string())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReminderBody {
    pub class: Uuid,
    #[serde(default)]
    pub message: Option<String>,
}

/// Remind students of a class that didn't submit a task
#[utoipa::path(
    request_body = ReminderBody,
    params(
        ("id", description = "task ID")
    ),
    responses(
        (status = 200, description = "Outcome tagged by `status`: `allSubmitted`, `cooldownActive` or `sent`"),
        (status = 400, description = "Malformed identifier or message", body = Problem),
        (status = 404, description = "Task or class doesn't exist", body = Problem),
    )
)]
#[post("/task/<id>/reminder", format = "application/json", data = "<body>")]
#[tracing::instrument(skip(db, c))]
pub async fn task_reminder(
    id: Uuid,
    body: Json<ReminderBody>,
    db: &State<Database>,
    c: &State<Config>,
) -> Result<Json<ReminderOutcome>, Problem> {
    let body = body.into_inner();
    let request = ReminderRequest {
        task_id: id,
        class_id: body.class,
        message: body.message,
    };

    let outcome = dispatch_reminder(
        db.inner(),
        &request,
        c.evaluation.reminder_cooldown(),
        Utc::now(),
    )
    .await
    .map_err(Problem::from)?;
    Ok(Json(outcome))
}
