use anyhow::{Context, Result};
use crypto_dashboard::{
    auth::{start_server, AppState, SqliteUserRepository},
    config::ServerConfig,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let users = SqliteUserRepository::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open user database {}", config.database_url))?;

    let state = Arc::new(AppState {
        users: Arc::new(users),
        bcrypt_cost: config.bcrypt_cost,
    });

    start_server(state, config.port)
        .await
        .context("Auth server failed")?;
    Ok(())
}
