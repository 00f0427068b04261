//! Shared types and rules for the retail batch ledger
//!
//! This crate contains the domain models and the pure stock rules (unit
//! conversion, quantity tolerance, money rounding) shared between the backend
//! settlement engine and the POS terminal helpers compiled to WASM.

pub mod models;
pub mod types;
pub mod units;
pub mod validation;

pub use models::*;
pub use types::*;
pub use units::*;
pub use validation::*;
