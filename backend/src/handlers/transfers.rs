//! HTTP handlers for inter-branch transfers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::Transfer;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::{CreateTransferInput, TransferDetail};
use crate::AppState;

/// Request a transfer
pub async fn create_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateTransferInput>,
) -> AppResult<(StatusCode, Json<TransferDetail>)> {
    check_permission(&current_user.0, "transfers", "create")?;
    let transfer = state
        .inventory
        .create_transfer(&current_user.0.scope(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// Get a transfer with its lines
pub async fn get_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<TransferDetail>> {
    check_permission(&current_user.0, "transfers", "read")?;
    let transfer = state
        .inventory
        .transfer(&current_user.0.scope(), transfer_id)
        .await?;
    Ok(Json(transfer))
}

/// Approve a pending transfer, moving its stock to the destination
pub async fn approve_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<TransferDetail>> {
    check_permission(&current_user.0, "transfers", "approve")?;
    let transfer = state
        .engine
        .approve_transfer(&current_user.0.scope(), transfer_id)
        .await?;
    Ok(Json(transfer))
}

/// Cancel a pending transfer
pub async fn cancel_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<Transfer>> {
    check_permission(&current_user.0, "transfers", "cancel")?;
    let transfer = state
        .engine
        .cancel_transfer(&current_user.0.scope(), transfer_id)
        .await?;
    Ok(Json(transfer))
}
