//! Stock batch models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// A discrete receipt of stock for one product at one branch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub id: Uuid,
    /// Insertion order; breaks ties between equal `received_at`
    pub sequence: i64,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub batch_number: String,
    pub quantity_received: Decimal,
    pub quantity_current: Decimal,
    pub cost_per_unit: Decimal,
    pub received_at: DateTime<Utc>,
    pub supplier_id: Option<Uuid>,
    pub source: BatchSource,
    /// Bumped on every decrement; used for compare-and-swap
    pub version: i32,
}

impl Batch {
    pub fn is_open(&self) -> bool {
        self.quantity_current > Decimal::ZERO
    }

    /// Remaining quantity at cost; `None` on overflow
    pub fn value(&self) -> Option<Decimal> {
        self.quantity_current.checked_mul(self.cost_per_unit)
    }
}

/// How a batch came into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSource {
    StockIn,
    TransferIn,
    Adjustment,
}

impl BatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchSource::StockIn => "stock_in",
            BatchSource::TransferIn => "transfer_in",
            BatchSource::Adjustment => "adjustment",
        }
    }
}

impl std::str::FromStr for BatchSource {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock_in" => Ok(BatchSource::StockIn),
            "transfer_in" => Ok(BatchSource::TransferIn),
            "adjustment" => Ok(BatchSource::Adjustment),
            other => Err(UnknownVariant::new("batch source", other)),
        }
    }
}

/// A batch about to be inserted; the store assigns `sequence` and `version`
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub batch_number: String,
    pub quantity: Decimal,
    pub cost_per_unit: Decimal,
    pub received_at: DateTime<Utc>,
    pub supplier_id: Option<Uuid>,
    pub source: BatchSource,
}
