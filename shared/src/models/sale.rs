//! Point-of-sale settlement models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::UnknownVariant;
use crate::validation::{validate_non_negative_amount, validate_positive_quantity};

/// One line of a cart as entered at the till
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CartLine {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub unit_name: String,
    #[validate(custom = "validate_positive_quantity")]
    pub quantity: Decimal,
    #[validate(custom = "validate_non_negative_amount")]
    pub unit_price: Decimal,
}

/// A completed sale (the "transaction" in business terms)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleSettlement {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub branch_id: Uuid,
    pub cashier_id: Uuid,
    pub invoice_number: String,
    pub total_amount: Decimal,
    pub total_cost: Decimal,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
}

/// One batch-level line of a sale. A cart line that spans several batches
/// becomes several settlement lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleSettlementLine {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub batch_id: Uuid,
    /// Quantity in the sold unit
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Batch cost converted to the sold unit
    pub cost_per_unit: Decimal,
    pub subtotal: Decimal,
    pub unit_name: String,
    pub conversion_factor: Decimal,
}

impl SaleSettlementLine {
    pub fn base_quantity(&self) -> Decimal {
        self.quantity * self.conversion_factor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    BankTransfer,
    EWallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::EWallet => "e_wallet",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "e_wallet" => Ok(PaymentMethod::EWallet),
            other => Err(UnknownVariant::new("payment method", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for SaleStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(SaleStatus::Completed),
            other => Err(UnknownVariant::new("sale status", other)),
        }
    }
}
