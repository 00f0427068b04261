//! Stock level read model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// On-hand stock of one product at one branch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockLevel {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub sku: String,
    pub name: String,
    pub base_unit: String,
    /// Σ quantity_current over the branch's batches, in base units
    pub on_hand: Decimal,
    /// Σ quantity_current × cost_per_unit
    pub value: Decimal,
    pub open_batches: i64,
    pub min_stock: Decimal,
    /// At or below the minimum-stock threshold
    pub low_stock: bool,
}
