//! Retail batch ledger - backend server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use retail_ledger::{
    config::Config,
    create_app,
    services::{AuditQueue, InventoryService, PgAuditSink, RetryConfig, SettlementEngine},
    store::PgLedgerStore,
    AppError, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ledger_server=debug,retail_ledger=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load().map_err(|e| AppError::Configuration(e.to_string()))?;

    tracing::info!("Starting retail ledger server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let (audit, audit_worker) =
        AuditQueue::spawn(Arc::new(PgAuditSink::new(db_pool.clone())), &config.audit);
    let store = PgLedgerStore::new(db_pool.clone());

    let state = AppState {
        db: db_pool,
        config: Arc::new(config.clone()),
        engine: Arc::new(SettlementEngine::new(
            store.clone(),
            audit.clone(),
            RetryConfig::from(&config.settlement),
        )),
        inventory: Arc::new(InventoryService::new(store, audit)),
    };

    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router and every queue handle are dropped by now
    tracing::info!("Flushing audit queue...");
    audit_worker.finished().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
