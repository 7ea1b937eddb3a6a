use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;

use crate::adapters::HttpConfig;

/// Configuration for the server binary, read from the environment.
///
/// Every variable is optional:
/// - `DATABASE_URL` (default `sqlite://tasks.db`)
/// - `HOST` (default `0.0.0.0`)
/// - `PORT` (default `8000`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskboardConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl TaskboardConfig {
    /// Loads a `.env` file if there is one, then reads the process environment.
    pub fn load() -> Result<Self> {
        dotenv().ok();
        let config = envy::from_env::<TaskboardConfig>()?;
        Ok(config)
    }

    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

impl Default for TaskboardConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://tasks.db".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_uses_defaults() {
        let config = envy::from_iter::<_, TaskboardConfig>(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config, TaskboardConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "sqlite://other.db".to_string()),
            ("PORT".to_string(), "9100".to_string()),
        ];
        let config = envy::from_iter::<_, TaskboardConfig>(vars).unwrap();
        assert_eq!(config.database_url, "sqlite://other.db");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.http().port, 9100);
    }

    #[test]
    fn rejects_bad_port() {
        let vars = vec![("PORT".to_string(), "not-a-port".to_string())];
        assert!(envy::from_iter::<_, TaskboardConfig>(vars).is_err());
    }
}
