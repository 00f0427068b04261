//! Product catalogue models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sellable product. All stock is measured in its base unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    /// Low-stock threshold in base units
    pub min_stock: Decimal,
    /// Name of the canonical base unit (e.g. "Pcs")
    pub base_unit: String,
    pub created_at: DateTime<Utc>,
}

/// A named unit a product can be sold or moved in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductUnit {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    /// Base units per one of this unit; exactly one unit per product has 1
    pub conversion_factor: Decimal,
    pub price: Decimal,
    pub barcode: Option<String>,
}

impl ProductUnit {
    pub fn is_base(&self) -> bool {
        self.conversion_factor == Decimal::ONE
    }
}
