//! Validation and reference-number helpers shared by the ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::ValidationError;

/// Quantities entered at the till or on a transfer must be positive
pub fn validate_positive_quantity(quantity: &Decimal) -> Result<(), ValidationError> {
    if *quantity > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("positive_quantity");
        err.message = Some("Quantity must be greater than zero".into());
        Err(err)
    }
}

/// Prices and costs may be zero (free items, adjustment stock) but not negative
pub fn validate_non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount >= Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("non_negative_amount");
        err.message = Some("Amount cannot be negative".into());
        Err(err)
    }
}

fn short_code(id: Uuid, len: usize) -> String {
    id.simple().to_string()[..len].to_uppercase()
}

/// Generate an invoice number (e.g., "INV-20240105-3F9A1C0D")
pub fn generate_invoice_number(at: DateTime<Utc>, sale_id: Uuid) -> String {
    format!("INV-{}-{}", at.format("%Y%m%d"), short_code(sale_id, 8))
}

/// Generate a transfer reference (e.g., "TRF-20240105-3F9A1C")
pub fn generate_transfer_reference(at: DateTime<Utc>, transfer_id: Uuid) -> String {
    format!("TRF-{}-{}", at.format("%Y%m%d"), short_code(transfer_id, 6))
}

/// Generate a batch number for received stock (e.g., "BN-20240105-3F9A1C")
pub fn generate_batch_number(at: DateTime<Utc>, batch_id: Uuid) -> String {
    format!("BN-{}-{}", at.format("%Y%m%d"), short_code(batch_id, 6))
}

/// Generate a batch number for a stock-count surplus (e.g., "ADJ-20240105-3F9A1C")
pub fn generate_adjustment_batch_number(at: DateTime<Utc>, batch_id: Uuid) -> String {
    format!("ADJ-{}-{}", at.format("%Y%m%d"), short_code(batch_id, 6))
}

/// Batch number of the destination batch created for a transfer line
pub fn transfer_batch_number(transfer_reference: &str, line_index: usize) -> String {
    format!("{}-{:02}", transfer_reference, line_index + 1)
}
