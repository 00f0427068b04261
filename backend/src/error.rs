//! Error handling for the retail batch ledger
//!
//! Provides consistent error responses in English and Indonesian

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{TransferStatus, UnitError, UnknownVariant};
use thiserror::Error;
use uuid::Uuid;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication and scoping errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions: requires {0}")]
    InsufficientPermissions(String),

    #[error("Branch {branch_id} is outside the current scope")]
    BranchScope { branch_id: Uuid },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ledger errors
    #[error("Unit '{unit}' is not defined for product {product_id}")]
    InvalidUnit { product_id: Uuid, unit: String },

    #[error(
        "Insufficient stock for product {product_id} at branch {branch_id}: \
         requested {requested}, short by {shortfall}"
    )]
    InsufficientStock {
        product_id: Uuid,
        branch_id: Uuid,
        requested: Decimal,
        shortfall: Decimal,
    },

    #[error("Transfer {transfer_id} is {status}, expected pending")]
    TransferState {
        transfer_id: Uuid,
        status: TransferStatus,
    },

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Whether re-running the whole workflow in a fresh transaction may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::ConcurrentModification(_) => true,
            AppError::DatabaseError(sqlx::Error::Database(db)) => {
                // serialization_failure, deadlock_detected
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }

    /// Whether the same write may succeed if simply attempted again: lost
    /// races plus connection and resource failures of the database
    pub fn is_transient(&self) -> bool {
        if self.is_retryable() {
            return true;
        }
        match self {
            AppError::DatabaseError(sqlx::Error::Io(_))
            | AppError::DatabaseError(sqlx::Error::PoolTimedOut) => true,
            AppError::DatabaseError(sqlx::Error::Database(db)) => db
                .code()
                // connection_exception, insufficient_resources, operator_intervention
                .map(|code| {
                    code.starts_with("08") || code.starts_with("53") || code.starts_with("57P")
                })
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl From<UnitError> for AppError {
    fn from(err: UnitError) -> Self {
        match err {
            UnitError::InvalidUnit { product_id, unit } => AppError::InvalidUnit { product_id, unit },
            out_of_range @ UnitError::QuantityOutOfRange { .. } => {
                AppError::validation("quantity", out_of_range.to_string())
            }
            mismatch @ UnitError::BaseUnitMismatch { .. } => {
                AppError::validation("base_unit", mismatch.to_string())
            }
            other => AppError::validation("units", other.to_string()),
        }
    }
}

impl From<UnknownVariant> for AppError {
    fn from(err: UnknownVariant) -> Self {
        AppError::Internal(format!("Corrupt stored value: {}", err))
    }
}

/// Path of the first failing field, descending into nested structs and
/// lists (e.g. `lines[0].quantity`)
fn first_invalid_field(errors: &ValidationErrors) -> Option<String> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by_key(|(name, _)| **name);
    let (name, kind) = fields.into_iter().next()?;

    let nested = match kind {
        ValidationErrorsKind::Field(_) => None,
        ValidationErrorsKind::Struct(inner) => {
            first_invalid_field(inner).map(|f| format!(".{}", f))
        }
        ValidationErrorsKind::List(items) => items.iter().next().map(|(idx, inner)| {
            match first_invalid_field(inner) {
                Some(f) => format!("[{}].{}", idx, f),
                None => format!("[{}]", idx),
            }
        }),
    };
    Some(format!("{}{}", name, nested.unwrap_or_default()))
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let field = first_invalid_field(&errors).unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    /// Bahasa Indonesia
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: String, message_id: String) -> Self {
        Self {
            code: code.to_string(),
            message_en,
            message_id,
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", msg.clone(), "Tidak diizinkan".to_string()),
            ),
            AppError::InsufficientPermissions(perm) => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    format!("Permission denied: requires {}", perm),
                    format!("Akses ditolak: memerlukan izin {}", perm),
                ),
            ),
            AppError::BranchScope { branch_id } => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "BRANCH_SCOPE",
                    format!("Branch {} is outside your scope", branch_id),
                    format!("Cabang {} di luar cakupan akses Anda", branch_id),
                ),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new(
                        "VALIDATION_ERROR",
                        message.clone(),
                        format!("Data tidak valid: {}", message),
                    )
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("{} tidak ditemukan", resource),
                ),
            ),
            AppError::InvalidUnit { product_id, unit } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    field: Some("unit_name".to_string()),
                    ..ErrorDetail::new(
                        "INVALID_UNIT",
                        format!("Unit '{}' is not defined for product {}", unit, product_id),
                        format!("Satuan '{}' tidak terdaftar untuk produk {}", unit, product_id),
                    )
                },
            ),
            AppError::InsufficientStock {
                product_id,
                shortfall,
                ..
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INSUFFICIENT_STOCK",
                    format!(
                        "Insufficient stock for product {}: short by {}",
                        product_id, shortfall
                    ),
                    format!(
                        "Stok produk {} tidak mencukupi: kurang {}",
                        product_id, shortfall
                    ),
                ),
            ),
            AppError::TransferState {
                transfer_id,
                status,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "TRANSFER_STATE",
                    format!("Transfer {} is already {}", transfer_id, status),
                    format!("Transfer {} sudah berstatus {}", transfer_id, status),
                ),
            ),
            AppError::ConcurrentModification(_) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "CONCURRENT_MODIFICATION",
                    "Stock changed while the request was processed. Please retry.".to_string(),
                    "Stok berubah saat permintaan diproses. Silakan coba lagi.".to_string(),
                ),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "CONFIGURATION_ERROR",
                    format!("Configuration error: {}", msg),
                    format!("Kesalahan konfigurasi: {}", msg),
                ),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    "Terjadi kesalahan pada basis data".to_string(),
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    msg.clone(),
                    "Terjadi kesalahan internal server".to_string(),
                ),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    "Terjadi kesalahan internal server".to_string(),
                ),
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn concurrent_modification_is_retryable() {
        assert!(AppError::ConcurrentModification("batch".into()).is_retryable());
        assert!(!AppError::NotFound("Transfer".into()).is_retryable());
        assert!(!AppError::InsufficientStock {
            product_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            requested: Decimal::ONE,
            shortfall: Decimal::ONE,
        }
        .is_retryable());
    }

    #[test]
    fn transient_covers_races_and_connection_loss() {
        assert!(AppError::ConcurrentModification("batch".into()).is_transient());
        assert!(AppError::DatabaseError(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!AppError::DatabaseError(sqlx::Error::RowNotFound).is_transient());
        assert!(!AppError::Internal("constraint".into()).is_transient());
    }

    #[derive(validator::Validate)]
    struct Line {
        #[validate(range(min = 1))]
        quantity: i64,
    }

    #[derive(validator::Validate)]
    struct Cart {
        #[validate]
        lines: Vec<Line>,
    }

    #[test]
    fn nested_validation_reports_field_path() {
        use validator::Validate;

        let cart = Cart {
            lines: vec![Line { quantity: 2 }, Line { quantity: 0 }],
        };
        let err: AppError = cart.validate().unwrap_err().into();
        assert!(matches!(err, AppError::Validation { field, .. } if field == "lines[1].quantity"));
    }

    #[test]
    fn out_of_range_quantity_is_a_validation_error() {
        let err: AppError = UnitError::QuantityOutOfRange {
            unit: "Box".into(),
            quantity: Decimal::MAX,
        }
        .into();
        assert!(matches!(err, AppError::Validation { field, .. } if field == "quantity"));
    }

    #[test]
    fn invalid_unit_maps_from_unit_error() {
        let product_id = Uuid::new_v4();
        let err: AppError = UnitError::InvalidUnit {
            product_id,
            unit: "Crate".into(),
        }
        .into();
        assert!(matches!(err, AppError::InvalidUnit { unit, .. } if unit == "Crate"));
    }

    #[test]
    fn status_codes() {
        let resp = AppError::TransferState {
            transfer_id: Uuid::new_v4(),
            status: TransferStatus::Completed,
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = AppError::BranchScope {
            branch_id: Uuid::new_v4(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
