//! Evaluation & reporting: turns stored submissions into aggregate scores,
//! leaderboards, completion states and flagged mistakes.

use std::collections::HashSet;

use uuid::Uuid;

use crate::data::class::Class;
use crate::data::task::Task;
use crate::error::{Entity, EvalError};
use crate::store::{DirectoryStore, TaskStore};

pub mod completion;
pub mod evaluation;
pub mod mistakes;
pub mod rank;
pub mod score;

/// Highest ISO week number.
pub const MAX_WEEK: u32 = 53;

pub(crate) fn check_id(field: &'static str, id: Uuid) -> Result<Uuid, EvalError> {
    if id.is_nil() {
        return Err(EvalError::validation(field, "nil UUID isn't a valid identifier"));
    }
    Ok(id)
}

pub(crate) fn check_term(term: u32) -> Result<u32, EvalError> {
    if term == 0 {
        return Err(EvalError::validation("term", "terms are numbered from 1"));
    }
    Ok(term)
}

pub(crate) fn check_week(week: u32) -> Result<u32, EvalError> {
    if week == 0 || week > MAX_WEEK {
        return Err(EvalError::validation(
            "week",
            format!("week must be between 1 and {}, got {}", MAX_WEEK, week),
        ));
    }
    Ok(week)
}

pub(crate) async fn require_task<S: TaskStore>(store: &S, id: Uuid) -> Result<Task, EvalError> {
    store
        .get_task(id)
        .await?
        .ok_or_else(|| EvalError::not_found(Entity::Task, id))
}

/// Loads all listed classes, failing on the first id without a class.
pub(crate) async fn require_classes<S: DirectoryStore>(
    store: &S,
    ids: &[Uuid],
) -> Result<Vec<Class>, EvalError> {
    let classes = store.get_classes(ids).await?;
    let found: HashSet<Uuid> = classes.iter().map(|it| it.id).collect();

    match ids.iter().find(|it| !found.contains(it)) {
        Some(missing) => Err(EvalError::not_found(Entity::Class, *missing)),
        None => Ok(classes),
    }
}

pub(crate) async fn require_class<S: DirectoryStore>(
    store: &S,
    id: Uuid,
) -> Result<Class, EvalError> {
    store
        .get_class(id)
        .await?
        .ok_or_else(|| EvalError::not_found(Entity::Class, id))
}
