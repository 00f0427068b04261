//! HTTP handlers for point-of-sale checkout

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::{CheckoutInput, SaleDetail};
use crate::AppState;

/// Settle a cart
pub async fn checkout(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CheckoutInput>,
) -> AppResult<(StatusCode, Json<SaleDetail>)> {
    check_permission(&current_user.0, "sales", "create")?;
    let sale = state.engine.checkout(&current_user.0.scope(), input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// Get a sale with its lines
pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SaleDetail>> {
    check_permission(&current_user.0, "sales", "read")?;
    let sale = state.inventory.sale(&current_user.0.scope(), sale_id).await?;
    Ok(Json(sale))
}
