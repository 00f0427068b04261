//! Inter-branch transfer models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;
use crate::units::{scale_to_base, UnitError};

/// A request to move stock from one branch to another
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transfer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Human-facing reference (e.g., "TRF-20240105-3F9A1C")
    pub reference: String,
    pub source_branch_id: Uuid,
    pub destination_branch_id: Uuid,
    pub status: TransferStatus,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Transfer lifecycle: `pending` moves to exactly one terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }

    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Pending, TransferStatus::Completed)
                | (TransferStatus::Pending, TransferStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "completed" => Ok(TransferStatus::Completed),
            "cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(UnknownVariant::new("transfer status", other)),
        }
    }
}

/// One product line of a transfer, with the unit snapshot taken at creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferLine {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub product_id: Uuid,
    /// Quantity in `unit_name`
    pub quantity: Decimal,
    pub unit_name: String,
    pub conversion_factor: Decimal,
}

impl TransferLine {
    pub fn base_quantity(&self) -> Result<Decimal, UnitError> {
        scale_to_base(self.quantity, self.conversion_factor, &self.unit_name)
    }
}
