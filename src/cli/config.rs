use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::app::AppState;
use crate::config::AppConfig;
use crate::database::{DatabaseManager, PgStore};
use crate::notify::{EventHub, Notifier};

/// Server configuration as the CLI sees it: `.env` first, then the process
/// environment.
pub fn load_app_config() -> AppConfig {
    let _ = dotenvy::dotenv();
    AppConfig::from_env()
}

/// The CLI always talks to PostgreSQL; the memory backend has nothing to
/// administer between runs.
pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    DatabaseManager::connect(&config.database)
        .await
        .with_context(|| format!("cannot connect to {}", DatabaseManager::redacted_url(&config.database.url)))
}

/// Services over the configured database. Notifications raised by CLI
/// commands have no worker and are dropped.
pub async fn open_state() -> anyhow::Result<AppState> {
    let config = load_app_config();
    let pool = connect(&config).await?;
    let (notifier, _outbox) = Notifier::new();
    Ok(AppState::new(
        Arc::new(config),
        Arc::new(PgStore::new(pool)),
        notifier,
        EventHub::new(),
    ))
}
