//! Results of a FIFO allocation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Quantity taken from a single batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationFragment {
    pub batch_id: Uuid,
    pub batch_number: String,
    /// Base units taken from the batch
    pub quantity: Decimal,
    pub cost_per_unit: Decimal,
}

impl AllocationFragment {
    pub fn cost(&self) -> Decimal {
        self.quantity * self.cost_per_unit
    }
}

/// Ordered, oldest-first breakdown of one allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub requested: Decimal,
    pub fragments: Vec<AllocationFragment>,
}

impl Allocation {
    pub fn total_taken(&self) -> Decimal {
        self.fragments.iter().map(|f| f.quantity).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.fragments.iter().map(AllocationFragment::cost).sum()
    }

    /// Σ(takenᵢ × costᵢ) / Σ(takenᵢ), zero for an empty allocation
    pub fn weighted_average_cost(&self) -> Decimal {
        let taken = self.total_taken();
        if taken.is_zero() {
            Decimal::ZERO
        } else {
            self.total_cost() / taken
        }
    }
}
