//! Batch ledger store
//!
//! A [`LedgerStore`] hands out one [`LedgerTx`] per unit of work. Every read
//! and write of a settlement goes through that transaction; nothing is
//! visible to other units of work until [`LedgerTx::commit`]. Dropping a
//! transaction without committing rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    Batch, Branch, NewBatch, Product, ProductUnit, SaleSettlement, SaleSettlementLine, StockLevel,
    Transfer, TransferLine, TransferStatus,
};

use crate::error::AppResult;
use crate::scope::ScopeContext;

pub mod memory;
pub mod postgres;

pub use memory::{LedgerState, MemoryLedgerStore};
pub use postgres::PgLedgerStore;

/// Opens scoped units of work against the shared ledger
#[async_trait]
pub trait LedgerStore: Clone + Send + Sync + 'static {
    type Tx: LedgerTx;

    /// Begin a unit of work bound to `ctx` for its whole lifetime
    async fn begin(&self, ctx: &ScopeContext) -> AppResult<Self::Tx>;
}

/// One all-or-nothing unit of work
#[async_trait]
pub trait LedgerTx: Send {
    fn context(&self) -> &ScopeContext;

    async fn product(&mut self, product_id: Uuid) -> AppResult<Option<Product>>;

    async fn product_units(&mut self, product_id: Uuid) -> AppResult<Vec<ProductUnit>>;

    async fn branch(&mut self, branch_id: Uuid) -> AppResult<Option<Branch>>;

    /// Batches with stock left, oldest received first (ties by insertion
    /// order), locked against other units of work until commit
    async fn lock_open_batches(&mut self, product_id: Uuid, branch_id: Uuid)
        -> AppResult<Vec<Batch>>;

    /// Every batch of the product at the branch, in FIFO order
    async fn list_batches(&mut self, product_id: Uuid, branch_id: Uuid) -> AppResult<Vec<Batch>>;

    /// Decrement `batch` by `quantity`. Fails with `ConcurrentModification`
    /// when the stored version no longer matches `batch.version` or the batch
    /// no longer holds `quantity`.
    async fn consume_batch(&mut self, batch: &Batch, quantity: Decimal) -> AppResult<()>;

    async fn insert_batch(&mut self, batch: NewBatch) -> AppResult<Batch>;

    async fn stock_levels(&mut self, branch_id: Uuid) -> AppResult<Vec<StockLevel>>;

    async fn insert_sale(
        &mut self,
        sale: &SaleSettlement,
        lines: &[SaleSettlementLine],
    ) -> AppResult<()>;

    async fn sale(
        &mut self,
        sale_id: Uuid,
    ) -> AppResult<Option<(SaleSettlement, Vec<SaleSettlementLine>)>>;

    async fn insert_transfer(&mut self, transfer: &Transfer, lines: &[TransferLine])
        -> AppResult<()>;

    /// Load a transfer, optionally locking it until commit
    async fn transfer(&mut self, transfer_id: Uuid, for_update: bool)
        -> AppResult<Option<Transfer>>;

    async fn transfer_lines(&mut self, transfer_id: Uuid) -> AppResult<Vec<TransferLine>>;

    /// Move a transfer to a terminal status, stamping `received_at` or
    /// `cancelled_at` with `at`
    async fn set_transfer_status(
        &mut self,
        transfer_id: Uuid,
        status: TransferStatus,
        at: DateTime<Utc>,
    ) -> AppResult<Transfer>;

    async fn commit(self) -> AppResult<()>;

    async fn rollback(self) -> AppResult<()>;
}
