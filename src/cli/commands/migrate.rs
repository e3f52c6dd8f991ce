use serde_json::json;

use crate::cli::config::{connect, load_app_config};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = load_app_config();
    let pool = connect(&config).await?;
    DatabaseManager::migrate(&pool).await?;

    output_success(
        &output_format,
        "Database schema is up to date",
        Some(json!({ "database": DatabaseManager::redacted_url(&config.database.url) })),
    )
}
