use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::error;

pub type Result<T> = std::result::Result<T, TaskboardError>;

/// One entry of a 422 response body: where the bad input was and what was wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn new(loc: &[&str], msg: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            loc: loc.iter().map(|s| s.to_string()).collect(),
            msg: msg.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum TaskboardError {
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Task not found")]
    TaskNotFound,
    #[error("Validation error: {}", .0.msg)]
    Validation(FieldError),
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskboardError {
    pub fn validation(loc: &[&str], msg: impl Into<String>, kind: impl Into<String>) -> Self {
        TaskboardError::Validation(FieldError::new(loc, msg, kind))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            TaskboardError::ProjectNotFound | TaskboardError::TaskNotFound => StatusCode::NOT_FOUND,
            TaskboardError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TaskboardError::Storage(_) | TaskboardError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for TaskboardError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = match &self {
            TaskboardError::ProjectNotFound | TaskboardError::TaskNotFound => {
                json!({ "detail": self.to_string() })
            }
            TaskboardError::Validation(field) => json!({ "detail": [field] }),
            TaskboardError::Storage(_) | TaskboardError::Io(_) => {
                #[cfg(feature = "tracing")]
                error!(error = %self, "Request failed");
                json!({ "detail": "Internal Server Error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
