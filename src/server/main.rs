use anyhow::Context;
use prk_taskboard::adapters::HttpServer;
use prk_taskboard::config::TaskboardConfig;
use prk_taskboard::storage::sqlite::SqliteStorage;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(feature = "tracing")]
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let config = TaskboardConfig::load().context("invalid configuration")?;
    let storage = SqliteStorage::new(&config.database_url, 5)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;
    let server = HttpServer::new(Arc::new(storage), &config.http())
        .await
        .with_context(|| format!("failed to listen on {}:{}", config.host, config.port))?;
    server.run().await.context("received error from running server")?;
    Ok(())
}
