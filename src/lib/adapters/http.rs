use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        path::ErrorKind,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, State,
    },
    routing::{delete, get, put},
    Json, Router,
};
use chrono::Local;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
#[cfg(feature = "tracing")]
use tower_http::trace::TraceLayer;

use crate::core::{
    FieldError, NewProject, NewTask, Project, Result, Task, TaskFilter, TaskPatch,
    TaskboardError,
};
use crate::storage::Storage;

#[cfg(feature = "tracing")]
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

pub struct AppState<S: Storage + 'static> {
    pub storage: Arc<S>,
}

impl<S: Storage + 'static> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

/// `axum::Json` whose rejections answer 422 in the same shape as our own validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(TaskboardError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(TaskboardError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(TaskboardError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for TaskboardError {
    fn from(rejection: JsonRejection) -> Self {
        let kind = match &rejection {
            JsonRejection::JsonDataError(_) => "value_error",
            JsonRejection::JsonSyntaxError(_) => "json_invalid",
            JsonRejection::MissingJsonContentType(_) => "content_type",
            _ => "body_error",
        };
        let text = rejection.body_text();
        let mut loc = vec!["body".to_string()];
        if let JsonRejection::JsonDataError(_) = &rejection {
            let detail = text.split_once("target type: ").map_or(text.as_str(), |(_, d)| d);
            loc.extend(field_path(detail));
        }
        TaskboardError::Validation(FieldError { loc, msg: text, kind: kind.to_string() })
    }
}

impl From<PathRejection> for TaskboardError {
    fn from(rejection: PathRejection) -> Self {
        let (key, kind) = match &rejection {
            PathRejection::FailedToDeserializePathParams(err) => match err.kind() {
                ErrorKind::ParseErrorAtKey { key, .. } => (Some(key.clone()), "int_parsing"),
                ErrorKind::ParseErrorAtIndex { .. } | ErrorKind::ParseError { .. } => {
                    (None, "int_parsing")
                }
                ErrorKind::InvalidUtf8InPathParam { key } => (Some(key.clone()), "string_unicode"),
                _ => (None, "value_error"),
            },
            PathRejection::MissingPathParams(_) => (None, "missing"),
            _ => (None, "value_error"),
        };
        let mut loc = vec!["path".to_string()];
        loc.extend(key);
        TaskboardError::Validation(FieldError {
            loc,
            msg: rejection.body_text(),
            kind: kind.to_string(),
        })
    }
}

impl From<QueryRejection> for TaskboardError {
    fn from(rejection: QueryRejection) -> Self {
        let text = rejection.body_text();
        let mut loc = vec!["query".to_string()];
        let kind = match &rejection {
            QueryRejection::FailedToDeserializeQueryString(_) => {
                let detail = text.split_once("query string: ").map_or(text.as_str(), |(_, d)| d);
                loc.extend(field_path(detail));
                "value_error"
            }
            _ => "query_error",
        };
        TaskboardError::Validation(FieldError { loc, msg: text, kind: kind.to_string() })
    }
}

/// The field a serde error points at, split into segments. Understands the
/// `path: message` prefix added by the extractors and serde's "missing field `x`".
fn field_path(detail: &str) -> Vec<String> {
    let mut loc = Vec::new();
    let mut rest = detail;
    if let Some((head, tail)) = detail.split_once(": ") {
        let is_path = !head.is_empty()
            && head
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'));
        if is_path {
            loc.extend(head.split('.').map(str::to_string));
            rest = tail;
        }
    }
    if let Some(field) = rest
        .strip_prefix("missing field `")
        .and_then(|s| s.split('`').next())
    {
        loc.push(field.to_string());
    }
    loc
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub message: &'static str,
}

pub async fn create_project<S: Storage + 'static>(
    State(state): State<AppState<S>>,
    ApiJson(body): ApiJson<NewProject>,
) -> Result<Json<Project>> {
    body.validate()?;
    let project = state.storage.insert_project(&body).await?;
    #[cfg(feature = "tracing")]
    info!(id = project.id, name = %project.name, "Created project");
    Ok(Json(project))
}

pub async fn list_projects<S: Storage + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<Project>>> {
    Ok(Json(state.storage.list_projects_with_counts().await?))
}

#[cfg_attr(feature = "tracing", instrument(skip(state)))]
pub async fn delete_project<S: Storage + 'static>(
    State(state): State<AppState<S>>,
    ApiPath(project_id): ApiPath<i64>,
) -> Result<Json<Deleted>> {
    if !state.storage.delete_project(project_id).await? {
        return Err(TaskboardError::ProjectNotFound);
    }
    Ok(Json(Deleted {
        message: "Project deleted successfully",
    }))
}

/// Incomplete tasks whose due date is before today (local time).
pub async fn notifications<S: Storage + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<Task>>> {
    let today = Local::now().date_naive();
    let overdue = state.storage.list_overdue_incomplete_tasks(today).await?;
    #[cfg(feature = "tracing")]
    debug!(%today, count = overdue.len(), "Collected overdue tasks");
    Ok(Json(overdue))
}

pub async fn create_task<S: Storage + 'static>(
    State(state): State<AppState<S>>,
    ApiJson(body): ApiJson<NewTask>,
) -> Result<Json<Task>> {
    body.validate()?;
    let task = state.storage.insert_task(&body).await?;
    #[cfg(feature = "tracing")]
    info!(id = task.id, project_id = task.project_id, "Created task");
    Ok(Json(task))
}

pub async fn list_tasks<S: Storage + 'static>(
    State(state): State<AppState<S>>,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> Result<Json<Vec<Task>>> {
    Ok(Json(state.storage.list_tasks(filter).await?))
}

#[cfg_attr(feature = "tracing", instrument(skip(state, body)))]
pub async fn update_task<S: Storage + 'static>(
    State(state): State<AppState<S>>,
    ApiPath(task_id): ApiPath<i64>,
    ApiJson(body): ApiJson<TaskPatch>,
) -> Result<Json<Task>> {
    body.validate()?;
    let task = state
        .storage
        .update_task(task_id, body)
        .await?
        .ok_or(TaskboardError::TaskNotFound)?;
    Ok(Json(task))
}

#[cfg_attr(feature = "tracing", instrument(skip(state)))]
pub async fn delete_task<S: Storage + 'static>(
    State(state): State<AppState<S>>,
    ApiPath(task_id): ApiPath<i64>,
) -> Result<Json<Deleted>> {
    if !state.storage.delete_task(task_id).await? {
        return Err(TaskboardError::TaskNotFound);
    }
    Ok(Json(Deleted {
        message: "Task successfully deleted",
    }))
}

/// Every route, with request tracing and the allow-everything CORS policy
/// (any origin, method and header, credentials included).
pub fn router<S: Storage + 'static>(storage: Arc<S>) -> Router {
    let projects = get(list_projects::<S>).post(create_project::<S>);
    let tasks = get(list_tasks::<S>).post(create_task::<S>);
    let overdue = get(notifications::<S>);

    let router = Router::new()
        .route("/projects", projects.clone())
        .route("/projects/", projects)
        .route("/projects/{project_id}", delete(delete_project::<S>))
        .route("/notifications", overdue.clone())
        .route("/notifications/", overdue)
        .route("/tasks", tasks.clone())
        .route("/tasks/", tasks)
        .route(
            "/tasks/{task_id}",
            put(update_task::<S>).delete(delete_task::<S>),
        );

    #[cfg(feature = "tracing")]
    let router = router.layer(TraceLayer::new_for_http().make_span_with(
        |request: &axum::extract::Request<_>| {
            let uri = request.uri().to_string();
            tracing::info_span!("http_request", method = ?request.method(), uri)
        },
    ));

    router
        .layer(CorsLayer::very_permissive())
        .with_state(AppState { storage })
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<S: Storage + 'static>(storage: Arc<S>, config: &HttpConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        Ok(Self {
            router: router(storage),
            listener,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        #[cfg(feature = "tracing")]
        info!(addr = %self.listener.local_addr()?, "HTTP server started");
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::field_path;

    #[test]
    fn field_path_from_serde_messages() {
        assert_eq!(field_path("missing field `title` at line 1 column 16"), ["title"]);
        assert_eq!(
            field_path("priority: invalid type: string \"high\", expected i64 at line 1 column 30"),
            ["priority"]
        );
        assert_eq!(field_path("invalid digit found in string"), Vec::<String>::new());
        assert_eq!(
            field_path("invalid type: integer `5`, expected a map at line 1 column 1"),
            Vec::<String>::new()
        );
    }
}
