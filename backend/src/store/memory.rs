//! In-process ledger store
//!
//! Units of work are serialized: `begin` takes the store lock and works on a
//! private copy of the state, which replaces the shared state only on
//! commit. Used by tests and by embedders that do not need Postgres.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use shared::{
    Batch, Branch, NewBatch, Product, ProductUnit, SaleSettlement, SaleSettlementLine, StockLevel,
    Transfer, TransferLine, TransferStatus,
};

use super::{LedgerStore, LedgerTx};
use crate::error::{AppError, AppResult};
use crate::scope::ScopeContext;

/// Everything the in-memory store holds, in insertion order
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    pub branches: Vec<Branch>,
    pub products: Vec<Product>,
    pub units: Vec<ProductUnit>,
    pub batches: Vec<Batch>,
    pub sales: Vec<SaleSettlement>,
    pub sale_lines: Vec<SaleSettlementLine>,
    pub transfers: Vec<Transfer>,
    pub transfer_lines: Vec<TransferLine>,
    next_sequence: i64,
}

impl LedgerState {
    fn fifo_batches(&self, tenant_id: Uuid, product_id: Uuid, branch_id: Uuid) -> Vec<Batch> {
        let mut batches: Vec<Batch> = self
            .batches
            .iter()
            .filter(|b| {
                b.tenant_id == tenant_id && b.product_id == product_id && b.branch_id == branch_id
            })
            .cloned()
            .collect();
        batches.sort_by(|a, b| {
            a.received_at
                .cmp(&b.received_at)
                .then(a.sequence.cmp(&b.sequence))
        });
        batches
    }
}

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_branch(&self, branch: Branch) {
        self.state.lock().await.branches.push(branch);
    }

    pub async fn add_product(&self, product: Product, units: Vec<ProductUnit>) -> AppResult<()> {
        shared::validate_unit_set(&product.base_unit, &units)?;
        let mut state = self.state.lock().await;
        state.products.push(product);
        state.units.extend(units);
        Ok(())
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> LedgerState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryLedgerTx;

    async fn begin(&self, ctx: &ScopeContext) -> AppResult<Self::Tx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryLedgerTx {
            guard,
            working,
            ctx: *ctx,
        })
    }
}

pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
    ctx: ScopeContext,
}

impl MemoryLedgerTx {
    fn tenant(&self) -> Uuid {
        self.ctx.tenant_id
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    fn context(&self) -> &ScopeContext {
        &self.ctx
    }

    async fn product(&mut self, product_id: Uuid) -> AppResult<Option<Product>> {
        let tenant = self.tenant();
        Ok(self
            .working
            .products
            .iter()
            .find(|p| p.id == product_id && p.tenant_id == tenant)
            .cloned())
    }

    async fn product_units(&mut self, product_id: Uuid) -> AppResult<Vec<ProductUnit>> {
        if self.product(product_id).await?.is_none() {
            return Ok(Vec::new());
        }
        Ok(self
            .working
            .units
            .iter()
            .filter(|u| u.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn branch(&mut self, branch_id: Uuid) -> AppResult<Option<Branch>> {
        let tenant = self.tenant();
        Ok(self
            .working
            .branches
            .iter()
            .find(|b| b.id == branch_id && b.tenant_id == tenant)
            .cloned())
    }

    async fn lock_open_batches(
        &mut self,
        product_id: Uuid,
        branch_id: Uuid,
    ) -> AppResult<Vec<Batch>> {
        Ok(self
            .working
            .fifo_batches(self.ctx.tenant_id, product_id, branch_id)
            .into_iter()
            .filter(Batch::is_open)
            .collect())
    }

    async fn list_batches(&mut self, product_id: Uuid, branch_id: Uuid) -> AppResult<Vec<Batch>> {
        Ok(self
            .working
            .fifo_batches(self.ctx.tenant_id, product_id, branch_id))
    }

    async fn consume_batch(&mut self, batch: &Batch, quantity: Decimal) -> AppResult<()> {
        let tenant = self.tenant();
        let stored = self
            .working
            .batches
            .iter_mut()
            .find(|b| b.id == batch.id && b.tenant_id == tenant)
            .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        if stored.version != batch.version || stored.quantity_current < quantity {
            return Err(AppError::ConcurrentModification(format!(
                "batch {} changed during allocation",
                batch.batch_number
            )));
        }
        stored.quantity_current -= quantity;
        stored.version += 1;
        Ok(())
    }

    async fn insert_batch(&mut self, batch: NewBatch) -> AppResult<Batch> {
        self.working.next_sequence += 1;
        let batch = Batch {
            id: batch.id,
            sequence: self.working.next_sequence,
            tenant_id: batch.tenant_id,
            product_id: batch.product_id,
            branch_id: batch.branch_id,
            batch_number: batch.batch_number,
            quantity_received: batch.quantity,
            quantity_current: batch.quantity,
            cost_per_unit: batch.cost_per_unit,
            received_at: batch.received_at,
            supplier_id: batch.supplier_id,
            source: batch.source,
            version: 0,
        };
        self.working.batches.push(batch.clone());
        Ok(batch)
    }

    async fn stock_levels(&mut self, branch_id: Uuid) -> AppResult<Vec<StockLevel>> {
        let tenant = self.tenant();
        let mut levels: Vec<StockLevel> = self
            .working
            .products
            .iter()
            .filter(|p| p.tenant_id == tenant)
            .map(|p| -> AppResult<StockLevel> {
                let batches = self.working.fifo_batches(tenant, p.id, branch_id);
                let on_hand: Decimal = batches.iter().map(|b| b.quantity_current).sum();
                let value = batches
                    .iter()
                    .try_fold(Decimal::ZERO, |total, b| total.checked_add(b.value()?))
                    .ok_or_else(|| {
                        AppError::Internal(format!("Stock value of {} overflowed", p.sku))
                    })?;
                Ok(StockLevel {
                    product_id: p.id,
                    branch_id,
                    sku: p.sku.clone(),
                    name: p.name.clone(),
                    base_unit: p.base_unit.clone(),
                    on_hand,
                    value,
                    open_batches: batches.iter().filter(|b| b.is_open()).count() as i64,
                    min_stock: p.min_stock,
                    low_stock: on_hand <= p.min_stock,
                })
            })
            .collect::<AppResult<_>>()?;
        levels.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(levels)
    }

    async fn insert_sale(
        &mut self,
        sale: &SaleSettlement,
        lines: &[SaleSettlementLine],
    ) -> AppResult<()> {
        self.working.sales.push(sale.clone());
        self.working.sale_lines.extend_from_slice(lines);
        Ok(())
    }

    async fn sale(
        &mut self,
        sale_id: Uuid,
    ) -> AppResult<Option<(SaleSettlement, Vec<SaleSettlementLine>)>> {
        let tenant = self.tenant();
        let Some(sale) = self
            .working
            .sales
            .iter()
            .find(|s| s.id == sale_id && s.tenant_id == tenant)
            .cloned()
        else {
            return Ok(None);
        };
        let lines = self
            .working
            .sale_lines
            .iter()
            .filter(|l| l.sale_id == sale_id)
            .cloned()
            .collect();
        Ok(Some((sale, lines)))
    }

    async fn insert_transfer(
        &mut self,
        transfer: &Transfer,
        lines: &[TransferLine],
    ) -> AppResult<()> {
        self.working.transfers.push(transfer.clone());
        self.working.transfer_lines.extend_from_slice(lines);
        Ok(())
    }

    async fn transfer(
        &mut self,
        transfer_id: Uuid,
        _for_update: bool,
    ) -> AppResult<Option<Transfer>> {
        let tenant = self.tenant();
        Ok(self
            .working
            .transfers
            .iter()
            .find(|t| t.id == transfer_id && t.tenant_id == tenant)
            .cloned())
    }

    async fn transfer_lines(&mut self, transfer_id: Uuid) -> AppResult<Vec<TransferLine>> {
        Ok(self
            .working
            .transfer_lines
            .iter()
            .filter(|l| l.transfer_id == transfer_id)
            .cloned()
            .collect())
    }

    async fn set_transfer_status(
        &mut self,
        transfer_id: Uuid,
        status: TransferStatus,
        at: DateTime<Utc>,
    ) -> AppResult<Transfer> {
        let tenant = self.tenant();
        let transfer = self
            .working
            .transfers
            .iter_mut()
            .find(|t| t.id == transfer_id && t.tenant_id == tenant)
            .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

        if !transfer.status.can_transition_to(status) {
            return Err(AppError::TransferState {
                transfer_id,
                status: transfer.status,
            });
        }
        transfer.status = status;
        match status {
            TransferStatus::Completed => transfer.received_at = Some(at),
            TransferStatus::Cancelled => transfer.cancelled_at = Some(at),
            TransferStatus::Pending => {}
        }
        Ok(transfer.clone())
    }

    async fn commit(mut self) -> AppResult<()> {
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        Ok(())
    }
}
