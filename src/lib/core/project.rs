use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::core::{Result, TaskboardError};

pub const DEFAULT_COLOR: &str = "#6b7280";

/// A project row together with the counts derived from its tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub task_count: i64,
    pub completed_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl NewProject {
    pub fn new(name: impl Into<String>, color: Option<&str>) -> Self {
        Self {
            name: name.into(),
            color: color.map(str::to_string),
        }
    }

    pub fn color(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_COLOR)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TaskboardError::validation(
                &["body", "name"],
                "name must not be empty",
                "value_error",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_falls_back_to_grey() {
        let project: NewProject = serde_json::from_str(r#"{"name": "Home"}"#).unwrap();
        assert_eq!(project.color(), DEFAULT_COLOR);

        let project: NewProject =
            serde_json::from_str(r##"{"name": "Home", "color": "#ff0000"}"##).unwrap();
        assert_eq!(project.color(), "#ff0000");
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = NewProject::new("   ", None).validate().unwrap_err();
        match err {
            TaskboardError::Validation(field) => assert_eq!(field.loc, ["body", "name"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
