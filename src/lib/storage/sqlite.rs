use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::core::{NewProject, NewTask, Project, Result, Task, TaskFilter, TaskPatch, TaskboardError};
use crate::storage::Storage;

#[cfg(feature = "tracing")]
use tracing::{debug, info, instrument};

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        color TEXT NOT NULL DEFAULT '#6b7280'
    )",
    "CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        is_complete BOOLEAN NOT NULL DEFAULT 0,
        priority INTEGER NOT NULL DEFAULT 1,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        due_date DATE
    )",
    "CREATE INDEX IF NOT EXISTS idx_tasks_project_id ON tasks (project_id)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks (due_date)",
];

const TASK_COLUMNS: &str = "id, title, priority, due_date, is_complete, project_id";

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Opens (creating if absent) the database at `url`, e.g. `sqlite://tasks.db` or `tasks.db`.
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let storage = Self { pool };
        storage.init_schema().await?;
        #[cfg(feature = "tracing")]
        info!(url = %url, "Opened task store");
        Ok(storage)
    }

    /// A private in-memory database. One pooled connection that never expires,
    /// since every SQLite connection to `:memory:` is a separate database.
    pub async fn new_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    async fn insert_project(&self, project: &NewProject) -> Result<Project> {
        let mut tx = self.pool.begin().await?;
        let (id, name, color): (i64, String, String) = sqlx::query_as(
            "INSERT INTO projects (name, color) VALUES (?, ?) RETURNING id, name, color",
        )
        .bind(&project.name)
        .bind(project.color())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Project {
            id,
            name,
            color,
            task_count: 0,
            completed_count: 0,
        })
    }

    async fn list_projects_with_counts(&self) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            "SELECT p.id, p.name, p.color,
                    COALESCE(c.task_count, 0) AS task_count,
                    COALESCE(c.completed_count, 0) AS completed_count
             FROM projects p
             LEFT JOIN (
                 SELECT project_id,
                        COUNT(id) AS task_count,
                        SUM(CASE WHEN is_complete THEN 1 ELSE 0 END) AS completed_count
                 FROM tasks
                 GROUP BY project_id
             ) c ON c.project_id = p.id
             ORDER BY p.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    async fn delete_project(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        #[cfg(feature = "tracing")]
        debug!(id, deleted, "Deleted project");
        Ok(deleted > 0)
    }

    async fn list_overdue_incomplete_tasks(&self, as_of: NaiveDate) -> Result<Vec<Task>> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE due_date < ? AND is_complete = 0
             ORDER BY id"
        );
        let tasks = sqlx::query_as::<_, Task>(&query)
            .bind(as_of)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    async fn insert_task(&self, task: &NewTask) -> Result<Task> {
        let query = format!(
            "INSERT INTO tasks (title, project_id, priority, due_date) VALUES (?, ?, ?, ?)
             RETURNING {TASK_COLUMNS}"
        );
        let mut tx = self.pool.begin().await?;
        let created = sqlx::query_as::<_, Task>(&query)
            .bind(&task.title)
            .bind(task.project_id)
            .bind(task.priority())
            .bind(task.due_date)
            .fetch_one(&mut *tx)
            .await
            .map_err(missing_project)?;
        tx.commit().await?;
        Ok(created)
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let tasks = match filter.project() {
            Some(project_id) => {
                let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ? ORDER BY id");
                sqlx::query_as::<_, Task>(&query)
                    .bind(project_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let query = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id");
                sqlx::query_as::<_, Task>(&query).fetch_all(&self.pool).await?
            }
        };
        Ok(tasks)
    }

    /// One `UPDATE ... RETURNING`: absent fields keep their column value, so
    /// no read has to be upgraded to a write lock.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<Option<Task>> {
        let query = format!(
            "UPDATE tasks SET
                title = COALESCE(?, title),
                priority = COALESCE(?, priority),
                is_complete = COALESCE(?, is_complete),
                project_id = COALESCE(?, project_id),
                due_date = CASE WHEN ? THEN ? ELSE due_date END
             WHERE id = ?
             RETURNING {TASK_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Task>(&query)
            .bind(patch.title)
            .bind(patch.priority)
            .bind(patch.is_complete)
            .bind(patch.project_id)
            .bind(patch.due_date.is_some())
            .bind(patch.due_date.flatten())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(missing_project)?;
        Ok(updated)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    async fn delete_task(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }
}

/// A task referencing a project that doesn't exist trips the foreign key.
fn missing_project(err: sqlx::Error) -> TaskboardError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            TaskboardError::ProjectNotFound
        }
        _ => err.into(),
    }
}
