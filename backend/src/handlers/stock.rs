//! HTTP handlers for stock-in, stock counts and stock queries

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Batch, StockLevel};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::{
    AdjustmentResult, CountOutcome, CountSheetInput, ReceiveStockInput, ReconcileInput,
};
use crate::AppState;

/// Receive a delivery as a new batch
pub async fn receive_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ReceiveStockInput>,
) -> AppResult<(StatusCode, Json<Batch>)> {
    check_permission(&current_user.0, "stock", "receive")?;
    let batch = state
        .inventory
        .receive_stock(&current_user.0.scope(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// Reconcile one product against a counted quantity
pub async fn reconcile_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ReconcileInput>,
) -> AppResult<Json<AdjustmentResult>> {
    check_permission(&current_user.0, "stock", "adjust")?;
    let result = state
        .engine
        .reconcile_stock(&current_user.0.scope(), input)
        .await?;
    Ok(Json(result))
}

/// Save a stock-count sheet
pub async fn save_opname(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CountSheetInput>,
) -> AppResult<Json<Vec<CountOutcome>>> {
    check_permission(&current_user.0, "stock", "adjust")?;
    let outcomes = state
        .engine
        .reconcile_count(&current_user.0.scope(), input)
        .await?;
    Ok(Json(outcomes))
}

/// Stock levels for every product at a branch
pub async fn get_branch_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(branch_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockLevel>>> {
    check_permission(&current_user.0, "stock", "read")?;
    let levels = state
        .inventory
        .stock_levels(&current_user.0.scope(), branch_id)
        .await?;
    Ok(Json(levels))
}

/// Batches of one product at a branch, oldest first
pub async fn get_product_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((branch_id, product_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<Batch>>> {
    check_permission(&current_user.0, "stock", "read")?;
    let batches = state
        .inventory
        .batches(&current_user.0.scope(), branch_id, product_id)
        .await?;
    Ok(Json(batches))
}
