//! Ledger services for the retail batch ledger

pub mod allocator;
pub mod audit;
pub mod inventory;
pub mod retry;
pub mod settlement;
pub mod units;

pub use allocator::allocate;
pub use audit::{AuditQueue, AuditSink, AuditWorker, MemoryAuditSink, PgAuditSink};
pub use inventory::{CreateTransferInput, InventoryService, ReceiveStockInput, TransferLineInput};
pub use retry::{with_retry, RetryConfig};
pub use settlement::{
    AdjustmentKind, AdjustmentResult, CheckoutInput, CountLine, CountOutcome, CountSheetInput,
    ReconcileInput, SaleDetail, SettlementEngine, TransferDetail,
};
