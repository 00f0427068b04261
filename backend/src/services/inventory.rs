//! Inventory service for stock-in, transfer requests and stock queries

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shared::{
    generate_batch_number, generate_transfer_reference, unit_cost_to_base_cost,
    validate_non_negative_amount, validate_positive_quantity, AuditAction, AuditEntry, Batch,
    BatchSource, EntityKind, NewBatch, StockLevel, Transfer, TransferLine, TransferStatus,
};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::audit::AuditQueue;
use super::settlement::{SaleDetail, TransferDetail};
use super::units::{base_quantity_of, resolve_product_unit};
use crate::error::{AppError, AppResult};
use crate::scope::ScopeContext;
use crate::store::{LedgerStore, LedgerTx};

/// Inventory service for receiving stock and managing transfers
#[derive(Clone)]
pub struct InventoryService<S: LedgerStore> {
    store: S,
    audit: AuditQueue,
}

/// Input for receiving stock from a supplier
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReceiveStockInput {
    pub branch_id: Uuid,
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub unit_name: String,
    #[validate(custom = "validate_positive_quantity")]
    pub quantity: Decimal,
    /// Cost of one `unit_name`
    #[validate(custom = "validate_non_negative_amount")]
    pub cost_per_unit: Decimal,
    #[validate(length(min = 1, max = 100))]
    pub batch_number: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub received_at: Option<DateTime<Utc>>,
}

/// Input for requesting a transfer between branches
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTransferInput {
    pub source_branch_id: Uuid,
    pub destination_branch_id: Uuid,
    #[validate]
    pub lines: Vec<TransferLineInput>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferLineInput {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub unit_name: String,
    #[validate(custom = "validate_positive_quantity")]
    pub quantity: Decimal,
}

impl<S: LedgerStore> InventoryService<S> {
    pub fn new(store: S, audit: AuditQueue) -> Self {
        Self { store, audit }
    }

    /// Record a delivery as a new batch. Quantity and cost are converted to
    /// base units.
    #[instrument(
        skip(self, ctx, input),
        fields(tenant_id = %ctx.tenant_id, branch_id = %input.branch_id, product_id = %input.product_id)
    )]
    pub async fn receive_stock(&self, ctx: &ScopeContext, input: ReceiveStockInput) -> AppResult<Batch> {
        input.validate()?;
        ctx.ensure_branch(input.branch_id)?;

        let mut tx = self.store.begin(ctx).await?;

        if tx.branch(input.branch_id).await?.is_none() {
            return Err(AppError::NotFound("Branch".to_string()));
        }
        let (product, unit) =
            resolve_product_unit(&mut tx, input.product_id, &input.unit_name).await?;
        let quantity = base_quantity_of(&unit, input.quantity)?;
        let cost_per_unit = unit_cost_to_base_cost(input.cost_per_unit, &unit);
        if quantity.checked_mul(cost_per_unit).is_none() {
            return Err(AppError::validation("cost_per_unit", "Batch value is out of range"));
        }

        let id = Uuid::new_v4();
        let received_at = input.received_at.unwrap_or_else(Utc::now);
        let batch = tx
            .insert_batch(NewBatch {
                id,
                tenant_id: ctx.tenant_id,
                product_id: product.id,
                branch_id: input.branch_id,
                batch_number: input
                    .batch_number
                    .clone()
                    .unwrap_or_else(|| generate_batch_number(received_at, id)),
                quantity,
                cost_per_unit,
                received_at,
                supplier_id: input.supplier_id,
                source: BatchSource::StockIn,
            })
            .await?;
        tx.commit().await?;

        info!(batch = %batch.batch_number, quantity = %batch.quantity_received, "Stock received");

        self.audit.record(AuditEntry::new(
            ctx.tenant_id,
            ctx.user_id,
            AuditAction::StockReceived,
            EntityKind::Batch,
            batch.id,
            json!({
                "batch_number": batch.batch_number,
                "product_id": batch.product_id,
                "branch_id": batch.branch_id,
                "quantity": batch.quantity_received,
                "cost_per_unit": batch.cost_per_unit,
                "supplier_id": batch.supplier_id,
            }),
        ));

        Ok(batch)
    }

    /// Open a pending transfer. Each line keeps the conversion factor of its
    /// unit as it was at creation.
    #[instrument(
        skip(self, ctx, input),
        fields(
            tenant_id = %ctx.tenant_id,
            source = %input.source_branch_id,
            destination = %input.destination_branch_id
        )
    )]
    pub async fn create_transfer(
        &self,
        ctx: &ScopeContext,
        input: CreateTransferInput,
    ) -> AppResult<TransferDetail> {
        input.validate()?;
        if input.lines.is_empty() {
            return Err(AppError::validation(
                "lines",
                "Transfer must contain at least one line",
            ));
        }
        if input.source_branch_id == input.destination_branch_id {
            return Err(AppError::validation(
                "destination_branch_id",
                "Source and destination branches must differ",
            ));
        }
        ctx.ensure_branch(input.source_branch_id)?;

        let mut tx = self.store.begin(ctx).await?;

        for branch_id in [input.source_branch_id, input.destination_branch_id] {
            if tx.branch(branch_id).await?.is_none() {
                return Err(AppError::NotFound("Branch".to_string()));
            }
        }

        let now = Utc::now();
        let transfer_id = Uuid::new_v4();

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let (product, unit) =
                resolve_product_unit(&mut tx, line.product_id, &line.unit_name).await?;
            base_quantity_of(&unit, line.quantity)?;
            lines.push(TransferLine {
                id: Uuid::new_v4(),
                transfer_id,
                product_id: product.id,
                quantity: line.quantity,
                unit_name: unit.name,
                conversion_factor: unit.conversion_factor,
            });
        }

        let transfer = Transfer {
            id: transfer_id,
            tenant_id: ctx.tenant_id,
            reference: generate_transfer_reference(now, transfer_id),
            source_branch_id: input.source_branch_id,
            destination_branch_id: input.destination_branch_id,
            status: TransferStatus::Pending,
            notes: input.notes.clone(),
            created_by: ctx.user_id,
            created_at: now,
            received_at: None,
            cancelled_at: None,
        };

        tx.insert_transfer(&transfer, &lines).await?;
        tx.commit().await?;

        info!(reference = %transfer.reference, lines = lines.len(), "Transfer created");

        self.audit.record(AuditEntry::new(
            ctx.tenant_id,
            ctx.user_id,
            AuditAction::TransferCreated,
            EntityKind::Transfer,
            transfer.id,
            json!({
                "reference": transfer.reference,
                "source_branch_id": transfer.source_branch_id,
                "destination_branch_id": transfer.destination_branch_id,
                "lines": lines.len(),
            }),
        ));

        Ok(TransferDetail { transfer, lines })
    }

    /// On-hand quantity and value of every product at a branch
    pub async fn stock_levels(&self, ctx: &ScopeContext, branch_id: Uuid) -> AppResult<Vec<StockLevel>> {
        ctx.ensure_branch(branch_id)?;

        let mut tx = self.store.begin(ctx).await?;
        let levels = tx.stock_levels(branch_id).await?;
        tx.rollback().await?;

        Ok(levels)
    }

    /// All batches of a product at a branch, oldest first
    pub async fn batches(
        &self,
        ctx: &ScopeContext,
        branch_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<Batch>> {
        ctx.ensure_branch(branch_id)?;

        let mut tx = self.store.begin(ctx).await?;
        let batches = tx.list_batches(product_id, branch_id).await?;
        tx.rollback().await?;

        Ok(batches)
    }

    /// A transfer with its lines, visible from either end
    pub async fn transfer(&self, ctx: &ScopeContext, transfer_id: Uuid) -> AppResult<TransferDetail> {
        let mut tx = self.store.begin(ctx).await?;

        let transfer = tx
            .transfer(transfer_id, false)
            .await?
            .filter(|t| {
                ctx.can_access_branch(t.source_branch_id)
                    || ctx.can_access_branch(t.destination_branch_id)
            })
            .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;
        let lines = tx.transfer_lines(transfer_id).await?;
        tx.rollback().await?;

        Ok(TransferDetail { transfer, lines })
    }

    /// A sale with its batch-level lines
    pub async fn sale(&self, ctx: &ScopeContext, sale_id: Uuid) -> AppResult<SaleDetail> {
        let mut tx = self.store.begin(ctx).await?;

        let (sale, lines) = tx
            .sale(sale_id)
            .await?
            .filter(|(sale, _)| ctx.can_access_branch(sale.branch_id))
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;
        tx.rollback().await?;

        Ok(SaleDetail { sale, lines })
    }
}
