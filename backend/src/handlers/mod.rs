//! HTTP handlers for the ledger API

pub mod health;
pub mod sales;
pub mod stock;
pub mod transfers;

pub use health::*;
pub use sales::*;
pub use stock::*;
pub use transfers::*;
