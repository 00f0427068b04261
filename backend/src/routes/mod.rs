//! Route definitions for the retail batch ledger

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - point of sale
        .nest("/sales", sales_routes(state.clone()))
        // Protected routes - inter-branch transfers
        .nest("/transfers", transfer_routes(state.clone()))
        // Protected routes - stock-in, counts and queries
        .nest("/stock", stock_routes(state))
}

/// Point-of-sale routes (protected)
fn sales_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/checkout", post(handlers::checkout))
        .route("/:sale_id", get(handlers::get_sale))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Transfer routes (protected)
fn transfer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_transfer))
        .route("/:transfer_id", get(handlers::get_transfer))
        .route("/:transfer_id/approve", post(handlers::approve_transfer))
        .route("/:transfer_id/cancel", post(handlers::cancel_transfer))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock routes (protected)
fn stock_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/receive", post(handlers::receive_stock))
        .route("/reconcile", post(handlers::reconcile_stock))
        .route("/opname", post(handlers::save_opname))
        .route("/branches/:branch_id", get(handlers::get_branch_stock))
        .route(
            "/branches/:branch_id/products/:product_id/batches",
            get(handlers::get_product_batches),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
