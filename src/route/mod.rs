use std::collections::BTreeMap;

use rocket::{Build, Rocket, Route};

pub mod class;
pub mod report;
pub mod submission;
pub mod task;

use class::*;
use report::*;
use submission::*;
use task::*;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    data::{submission::EvaluationStatus, task::TaskStatus},
    error::ConsistencyWarning,
    eval::{
        completion::{CompletionState, CompletionStatus, CompletionSummary},
        evaluation::EvaluationResult,
        mistakes::{MistakePolicy, MistakeReport, QuestionAccuracy},
        rank::LeaderboardRow,
        score::{Grouping, ScoreEntry},
    },
    notify::sync::TransitionReport,
    resp::problem::Problem,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        report_scores,
        report_leaderboard,
        task_completion,
        task_mistakes,
        task_status,
        task_delete,
        task_reminder,
        class_completion,
        submission_evaluate
    ),
    components(schemas(
        Grouping,
        ScoreEntry,
        LeaderboardRow,
        LeaderboardPage,
        CompletionStatus,
        CompletionState,
        CompletionSummary,
        MistakePolicy,
        QuestionAccuracy,
        MistakeReport,
        TaskStatus,
        StatusChange,
        TransitionReport,
        ConsistencyWarning,
        ReminderBody,
        EvaluationStatus,
        EvaluationBody,
        EvaluationResult,
        Problem
    )),
    modifiers(&V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

pub fn api_v1() -> Vec<Route> {
    routes![
        report_scores,
        report_leaderboard,
        task_completion,
        task_mistakes,
        task_status,
        task_delete,
        task_reminder,
        class_completion,
        submission_evaluate
    ]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/api/v1", api_v1()).mount(
        "/",
        SwaggerUi::new("/swagger/<_..>").url("/api/v1/openapi.json", ApiDocV1::openapi()),
    )
}
