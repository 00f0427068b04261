//! Domain models for the retail batch ledger

mod allocation;
mod audit;
mod batch;
mod branch;
mod product;
mod sale;
mod stock;
mod transfer;

pub use allocation::*;
pub use audit::*;
pub use batch::*;
pub use branch::*;
pub use product::*;
pub use sale::*;
pub use stock::*;
pub use transfer::*;

/// Returned when a stored status or tag string does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
