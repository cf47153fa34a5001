use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error("unable to reach MongoDB database '{0}'")]
    Unreachable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cors(#[from] rocket_cors::Error),
}

/// Failures of the underlying storage. Always fatal for the operation that
/// hit them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    BsonSerialization(#[from] bson::ser::Error),
    #[error(transparent)]
    BsonDeserialization(#[from] bson::de::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Entity kinds that can be referenced by id in engine requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Task,
    Class,
    Submission,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Task => write!(f, "task"),
            Entity::Class => write!(f, "class"),
            Entity::Submission => write!(f, "submission"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EvalError {
    /// Malformed identifiers or filter ranges. Raised before any store access.
    #[error("invalid '{field}': {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{entity} '{id}' doesn't exist")]
    NotFound { entity: Entity, id: Uuid },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EvalError {
    pub fn validation(field: &'static str, reason: impl ToString) -> EvalError {
        EvalError::Validation {
            field,
            reason: reason.to_string(),
        }
    }

    pub fn not_found(entity: Entity, id: Uuid) -> EvalError {
        EvalError::NotFound { entity, id }
    }
}

/// Non-fatal discrepancy between the notifications a transition intended to
/// write and the ones the store accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyWarning {
    pub task_id: Uuid,
    pub expected: usize,
    pub created: usize,
    pub failed: usize,
}

impl std::fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "task {}: {} of {} notifications written, {} failed",
            self.task_id, self.created, self.expected, self.failed
        )
    }
}
