//! Retail batch ledger
//!
//! Tracks stock as discrete received batches per product and branch and
//! settles point-of-sale checkouts, inter-branch transfers and stock counts
//! against them, consuming batches oldest first.

use std::sync::Arc;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod scope;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use scope::ScopeContext;

use services::{InventoryService, SettlementEngine};
use store::PgLedgerStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub engine: Arc<SettlementEngine<PgLedgerStore>>,
    pub inventory: Arc<InventoryService<PgLedgerStore>>,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", axum::routing::get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
