use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

use crate::core::{Result, TaskboardError};

pub const DEFAULT_PRIORITY: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub priority: i64,
    pub due_date: Option<NaiveDate>,
    pub is_complete: bool,
    pub project_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub project_id: i64,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, project_id: i64) -> Self {
        Self {
            title: title.into(),
            project_id,
            priority: None,
            due_date: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn priority(&self) -> i64 {
        self.priority.unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)
    }
}

/// Partial update of a task. Only the fields present in the request are written.
///
/// `due_date` keeps "absent" and "null" apart: absent leaves the date alone,
/// `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub is_complete: Option<bool>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn validate(&self) -> Result<()> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }
}

/// Query string of `GET /tasks/`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub project_id: Option<i64>,
}

impl TaskFilter {
    pub fn by_project(project_id: i64) -> Self {
        Self { project_id: Some(project_id) }
    }

    /// The project to filter on. A `project_id` of 0 means "every task",
    /// the same as leaving it out.
    pub fn project(&self) -> Option<i64> {
        self.project_id.filter(|id| *id != 0)
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(TaskboardError::validation(
            &["body", "title"],
            "title must not be empty",
            "value_error",
        ));
    }
    Ok(())
}

fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
