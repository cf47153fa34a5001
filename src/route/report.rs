use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::data::submission::EvaluationStatus;
use crate::eval::rank::{leaderboard, LeaderboardRow};
use crate::eval::score::{aggregate_scores, Grouping, ScoreEntry, ScoreQuery};
use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromFormField)]
pub enum GroupParam {
    Student,
    Class,
}

impl From<GroupParam> for Grouping {
    fn from(value: GroupParam) -> Self {
        match value {
            GroupParam::Student => Grouping::Student,
            GroupParam::Class => Grouping::Class,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromFormField)]
pub enum StatusParam {
    Pending,
    Completed,
}

impl From<StatusParam> for EvaluationStatus {
    fn from(value: StatusParam) -> Self {
        match value {
            StatusParam::Pending => EvaluationStatus::Pending,
            StatusParam::Completed => EvaluationStatus::Completed,
        }
    }
}

/// Submission filters shared by score reports and leaderboards.
#[derive(Debug, Clone, FromForm, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportParams {
    /// Academic term, numbered from 1.
    pub term: Option<u32>,
    /// ISO week, 1 to 53.
    pub week: Option<u32>,
    pub task: Option<Uuid>,
    pub class: Option<Uuid>,
    pub student: Option<Uuid>,
    /// `pending` or `completed`; ignored by leaderboards.
    #[param(value_type = Option<String>)]
    pub status: Option<StatusParam>,
    /// `student` (default) or `class`.
    #[param(value_type = Option<String>)]
    pub group: Option<GroupParam>,
}

impl From<ReportParams> for ScoreQuery {
    fn from(value: ReportParams) -> Self {
        ScoreQuery {
            term: value.term,
            week: value.week,
            task_id: value.task,
            class_id: value.class,
            student_id: value.student,
            evaluation_status: value.status.map(Into::into),
            grouping: value.group.map(Into::into).unwrap_or_default(),
        }
    }
}

/// Aggregate scores per student or class
#[utoipa::path(
    params(ReportParams),
    responses(
        (status = 200, description = "Aggregate scores, ordered by entity ID", body = Vec<ScoreEntry>),
        (status = 400, description = "Invalid filter", body = Problem),
        (status = 404, description = "Filtered task or class doesn't exist", body = Problem),
    )
)]
#[get("/report/scores?<params..>")]
#[tracing::instrument(skip(db))]
pub async fn report_scores(
    params: ReportParams,
    db: &State<Database>,
) -> Result<Json<Vec<ScoreEntry>>, Problem> {
    let entries = aggregate_scores(db.inner(), &params.into())
        .await
        .map_err(Problem::from)?;
    Ok(Json(entries))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPage {
    /// Number of ranked entities over all pages.
    pub total: usize,
    pub page: u32,
    pub page_length: u32,
    pub rows: Vec<LeaderboardRow>,
}

/// Dense-ranked leaderboard of evaluated submissions
#[utoipa::path(
    params(
        ReportParams,
        ("len" = Option<u32>, Query, description = "Rows per page"),
        ("page" = Option<u32>, Query, description = "Zero based page index"),
    ),
    responses(
        (status = 200, description = "One page of the leaderboard", body = LeaderboardPage),
        (status = 400, description = "Invalid filter", body = Problem),
        (status = 404, description = "Filtered task or class doesn't exist", body = Problem),
    )
)]
#[get("/report/leaderboard?<params..>")]
#[tracing::instrument(skip(db))]
pub async fn report_leaderboard(
    params: ReportParams,
    paging: PageState,
    db: &State<Database>,
) -> Result<Json<LeaderboardPage>, Problem> {
    let board = leaderboard(db.inner(), &params.into())
        .await
        .map_err(Problem::from)?;
    let total = board.rows.len();
    let board = board.page(paging.page_length as usize, paging.page as usize);

    Ok(Json(LeaderboardPage {
        total,
        page: paging.page,
        page_length: paging.page_length,
        rows: board.rows,
    }))
}
