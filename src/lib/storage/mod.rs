pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::core::{NewProject, NewTask, Project, Result, Task, TaskFilter, TaskPatch};

#[async_trait]
pub trait Storage: Send + Sync {
    async fn insert_project(&self, project: &NewProject) -> Result<Project>;
    async fn list_projects_with_counts(&self) -> Result<Vec<Project>>;
    /// Returns `false` when no project had this id. Owned tasks go with it.
    async fn delete_project(&self, id: i64) -> Result<bool>;
    async fn list_overdue_incomplete_tasks(&self, as_of: NaiveDate) -> Result<Vec<Task>>;
    async fn insert_task(&self, task: &NewTask) -> Result<Task>;
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>>;
    async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<Option<Task>>;
    async fn delete_task(&self, id: i64) -> Result<bool>;
}
