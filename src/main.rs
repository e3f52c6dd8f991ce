use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use formmaker_api::config::{AppConfig, StoreBackend};
use formmaker_api::database::{DatabaseManager, MemoryStore, PgStore, Store};
use formmaker_api::notify::{self, EventHub, LogMailer, Notifier};
use formmaker_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("formmaker_api=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    info!("Starting Formmaker API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let store = open_store(&config).await?;
    info!("Using {} store", store.backend_name());

    let hub = EventHub::new();
    let (notifier, outbox) = Notifier::new();
    let mailer = Arc::new(LogMailer::new(config.mail.from.clone()));
    tokio::spawn(notify::run_worker(outbox, mailer, hub.clone()));

    let port = config.server.port;
    let app = router(AppState::new(Arc::new(config), store, notifier, hub));

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Formmaker API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config.database.backend {
        StoreBackend::Memory => {
            if config.is_production() {
                warn!("memory store selected in production; data is lost on restart");
            }
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = DatabaseManager::connect(&config.database).await?;
            DatabaseManager::migrate(&pool).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}
