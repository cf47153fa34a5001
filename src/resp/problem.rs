use std::io::Cursor;

use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use utoipa::ToSchema;

use crate::error::{EvalError, StoreError};

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Problem {
    #[serde(skip)]
    pub status: Status,
    pub type_uri: String,
    pub title: String,

    pub detail: Option<String>,

    #[schema(value_type = Object)]
    pub body: Map<String, Value>,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            status: Status::InternalServerError,
            type_uri: "about:blank".to_string(),
            title: "Problem".to_string(),
            detail: None,
            body: Map::new(),
        }
    }
}

impl Problem {
    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: "about:blank".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn insert_str(&mut self, key: impl ToString, value: impl ToString) -> &mut Problem {
        self.body
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut body = self.body.clone();

        // Following are required by rfc7807
        body.insert(String::from("type"), serde_json::Value::from(self.type_uri));
        body.insert(String::from("title"), serde_json::Value::from(self.title));

        // Optional parameters as specified by rfc7807
        if let Some(detail) = self.detail {
            body.insert(String::from("detail"), serde_json::Value::from(detail));
        }
        body.insert(
            String::from("status"),
            serde_json::Value::from(self.status.code),
        );

        let body_string = serde_json::Value::Object(body).to_string();

        Response::build()
            .status(self.status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header("Content-Language", "en")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

impl From<mongodb::error::Error> for Problem {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        fn mongodb_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "MongoDB failed while processing request.",
            )
        }

        fn access_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "Server was unable to access MongoDB.",
            )
        }

        fn bad_db_request() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "MongoDB was unable to process bad server request.",
            )
        }

        fn bson_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "There was a problem with handling MongoDB bson.",
            )
        }

        match e.kind.as_ref() {
            ErrorKind::InvalidArgument { .. } => bad_db_request(),
            ErrorKind::Authentication { .. } => access_problem(),
            ErrorKind::BsonDeserialization(_) => bson_problem(),
            ErrorKind::BsonSerialization(_) => bson_problem(),
            ErrorKind::BulkWrite(_) => bad_db_request(),
            ErrorKind::Command(_) => bad_db_request(),
            ErrorKind::DnsResolve { .. } => access_problem(),
            ErrorKind::Io(_) => mongodb_problem()
                .detail("An IO error occurred. Submitted data might not be properly stored.")
                .clone(),
            ErrorKind::ServerSelection { .. } => access_problem(),
            ErrorKind::InvalidTlsConfig { .. } => access_problem(),
            ErrorKind::Write(_) => mongodb_problem()
                .detail("A write error occurred. Submitted data might not be properly stored.")
                .clone(),
            ErrorKind::IncompatibleServer { .. } => access_problem(),
            _ => mongodb_problem(),
        }
    }
}

impl From<StoreError> for Problem {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => Problem::from(e),
            StoreError::BsonSerialization(_) | StoreError::BsonDeserialization(_) => {
                Problem::new_untyped(
                    Status::InternalServerError,
                    "An error occurred while processing BSON data.",
                )
            }
            StoreError::Unavailable(reason) => {
                Problem::new_untyped(Status::ServiceUnavailable, "Storage is unavailable.")
                    .detail(reason)
                    .clone()
            }
        }
    }
}

impl From<EvalError> for Problem {
    fn from(e: EvalError) -> Self {
        match e {
            EvalError::Validation { field, reason } => {
                Problem::new_untyped(Status::BadRequest, "Invalid request.")
                    .insert_str("field", field)
                    .detail(reason)
                    .clone()
            }
            EvalError::NotFound { entity, id } => {
                Problem::new_untyped(Status::NotFound, format!("The {} doesn't exist.", entity))
                    .insert_str("id", id)
                    .clone()
            }
            EvalError::Store(e) => {
                tracing::error!("Store failure: {}", e);
                Problem::from(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Entity;
    use uuid::Uuid;

    #[test]
    fn validation_maps_to_bad_request() {
        let problem = Problem::from(EvalError::validation("week", "out of range"));
        assert_eq!(problem.status, Status::BadRequest);
        assert_eq!(problem.detail.as_deref(), Some("out of range"));
        assert_eq!(problem.body.get("field"), Some(&Value::from("week")));
    }

    #[test]
    fn not_found_names_the_entity() {
        let id = Uuid::new_v4();
        let problem = Problem::from(EvalError::not_found(Entity::Task, id));
        assert_eq!(problem.status, Status::NotFound);
        assert_eq!(problem.title, "The task doesn't exist.");
        assert_eq!(problem.body.get("id"), Some(&Value::from(id.to_string())));
    }

    #[test]
    fn unavailable_store_is_service_unavailable() {
        let problem = Problem::from(EvalError::Store(StoreError::Unavailable(
            "offline".to_string(),
        )));
        assert_eq!(problem.status, Status::ServiceUnavailable);
    }
}
