//! Settlement engine: sale checkout, transfer approval and cancellation,
//! stock reconciliation
//!
//! Every workflow runs inside a single [`LedgerTx`]. Any failure drops the
//! transaction uncommitted, which undoes every batch decrement and record
//! written so far. Workflows that lose an optimistic-concurrency race are
//! re-run from scratch in a fresh transaction.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    base_cost_to_unit_cost, checked_line_amount, from_base_units,
    generate_adjustment_batch_number, generate_invoice_number, is_negligible, round_money,
    split_money, transfer_batch_number, AuditAction, AuditEntry, BatchSource, CartLine,
    EntityKind, NewBatch, PaymentMethod, SaleSettlement, SaleSettlementLine, SaleStatus, Transfer,
    TransferLine, TransferStatus,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::allocator::allocate;
use super::audit::AuditQueue;
use super::retry::{with_retry, RetryConfig};
use super::units::{base_quantity_of, resolve_product_unit};
use crate::error::{AppError, AppResult};
use crate::scope::ScopeContext;
use crate::store::{LedgerStore, LedgerTx};

/// Runs the ledger's mutating workflows against a [`LedgerStore`]
#[derive(Clone)]
pub struct SettlementEngine<S: LedgerStore> {
    store: S,
    audit: AuditQueue,
    retry: RetryConfig,
}

/// Input for a point-of-sale checkout
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutInput {
    pub branch_id: Uuid,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[validate]
    pub lines: Vec<CartLine>,
}

/// A sale together with its batch-level lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleDetail {
    pub sale: SaleSettlement,
    pub lines: Vec<SaleSettlementLine>,
}

/// A transfer together with its lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferDetail {
    pub transfer: Transfer,
    pub lines: Vec<TransferLine>,
}

/// Input for reconciling one product against a physical count
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileInput {
    pub branch_id: Uuid,
    pub product_id: Uuid,
    /// Counted quantity in base units
    pub actual_quantity: Decimal,
    pub notes: Option<String>,
}

/// A stock-count sheet covering several products at one branch
#[derive(Debug, Clone, Deserialize)]
pub struct CountSheetInput {
    pub branch_id: Uuid,
    pub lines: Vec<CountLine>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountLine {
    pub product_id: Uuid,
    pub actual_quantity: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Unchanged,
    Surplus,
    Shrinkage,
}

/// Outcome of reconciling one product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentResult {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub kind: AdjustmentKind,
    pub previous_quantity: Decimal,
    pub actual_quantity: Decimal,
    pub difference: Decimal,
    /// Adjustment batch created for a surplus
    pub batch_id: Option<Uuid>,
}

/// Per-product outcome of a count sheet; failed lines carry the error
#[derive(Debug, Clone, Serialize)]
pub struct CountOutcome {
    pub product_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AdjustmentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<S: LedgerStore> SettlementEngine<S> {
    pub fn new(store: S, audit: AuditQueue, retry: RetryConfig) -> Self {
        Self {
            store,
            audit,
            retry,
        }
    }

    /// Settle a cart: allocate every line FIFO and record the sale.
    ///
    /// Either every line is fully allocated and the sale is committed, or
    /// nothing changes.
    #[instrument(
        skip(self, ctx, input),
        fields(tenant_id = %ctx.tenant_id, branch_id = %input.branch_id, lines = input.lines.len())
    )]
    pub async fn checkout(&self, ctx: &ScopeContext, input: CheckoutInput) -> AppResult<SaleDetail> {
        input.validate()?;
        if input.lines.is_empty() {
            return Err(AppError::validation("lines", "Cart must contain at least one line"));
        }
        ctx.ensure_branch(input.branch_id)?;

        let input = &input;
        let detail = with_retry(&self.retry, AppError::is_retryable, move || {
            self.checkout_once(ctx, input)
        })
        .await
        .map_err(|e| {
            warn!("Checkout rejected: {}", e);
            e
        })?;

        info!(
            sale_id = %detail.sale.id,
            invoice = %detail.sale.invoice_number,
            total = %detail.sale.total_amount,
            "Checkout settled"
        );

        self.audit.record(AuditEntry::new(
            ctx.tenant_id,
            ctx.user_id,
            AuditAction::SaleCheckout,
            EntityKind::SaleSettlement,
            detail.sale.id,
            json!({
                "invoice_number": detail.sale.invoice_number,
                "branch_id": detail.sale.branch_id,
                "total_amount": detail.sale.total_amount,
                "total_cost": detail.sale.total_cost,
                "payment_method": detail.sale.payment_method.as_str(),
                "lines": detail.lines.len(),
            }),
        ));

        Ok(detail)
    }

    async fn checkout_once(&self, ctx: &ScopeContext, input: &CheckoutInput) -> AppResult<SaleDetail> {
        let mut tx = self.store.begin(ctx).await?;

        if tx.branch(input.branch_id).await?.is_none() {
            return Err(AppError::NotFound("Branch".to_string()));
        }

        let now = Utc::now();
        let sale_id = Uuid::new_v4();
        let mut lines = Vec::new();
        let mut total_amount = Decimal::ZERO;
        let mut total_cost = Decimal::ZERO;

        for cart_line in &input.lines {
            let (product, unit) =
                resolve_product_unit(&mut tx, cart_line.product_id, &cart_line.unit_name).await?;
            let required = base_quantity_of(&unit, cart_line.quantity)?;
            let line_amount = checked_line_amount(cart_line.quantity, cart_line.unit_price)
                .ok_or_else(|| AppError::validation("unit_price", "Line amount is out of range"))?;

            let allocation = allocate(&mut tx, product.id, input.branch_id, required).await?;

            let weights: Vec<Decimal> = allocation.fragments.iter().map(|f| f.quantity).collect();
            let subtotals = split_money(line_amount, &weights);

            for (fragment, subtotal) in allocation.fragments.iter().zip(subtotals) {
                lines.push(SaleSettlementLine {
                    id: Uuid::new_v4(),
                    sale_id,
                    product_id: product.id,
                    batch_id: fragment.batch_id,
                    quantity: from_base_units(&unit, fragment.quantity),
                    unit_price: cart_line.unit_price,
                    cost_per_unit: base_cost_to_unit_cost(fragment.cost_per_unit, &unit),
                    subtotal,
                    unit_name: unit.name.clone(),
                    conversion_factor: unit.conversion_factor,
                });
            }

            total_amount = total_amount
                .checked_add(line_amount)
                .ok_or_else(|| AppError::validation("lines", "Cart total is out of range"))?;
            total_cost += allocation.total_cost();
        }

        let sale = SaleSettlement {
            id: sale_id,
            tenant_id: ctx.tenant_id,
            branch_id: input.branch_id,
            cashier_id: ctx.user_id,
            invoice_number: generate_invoice_number(now, sale_id),
            total_amount,
            total_cost: round_money(total_cost),
            payment_method: input.payment_method,
            status: SaleStatus::Completed,
            created_at: now,
        };

        tx.insert_sale(&sale, &lines).await?;
        tx.commit().await?;

        Ok(SaleDetail { sale, lines })
    }

    /// Move the stock of a pending transfer from its source branch into new
    /// batches at the destination.
    ///
    /// A shortfall on any line fails the whole approval and the transfer
    /// stays pending.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn approve_transfer(
        &self,
        ctx: &ScopeContext,
        transfer_id: Uuid,
    ) -> AppResult<TransferDetail> {
        let detail = with_retry(&self.retry, AppError::is_retryable, move || {
            self.approve_transfer_once(ctx, transfer_id)
        })
        .await
        .map_err(|e| {
            warn!("Transfer approval rejected: {}", e);
            e
        })?;

        info!(
            reference = %detail.transfer.reference,
            lines = detail.lines.len(),
            "Transfer approved"
        );

        self.audit.record(AuditEntry::new(
            ctx.tenant_id,
            ctx.user_id,
            AuditAction::TransferApproved,
            EntityKind::Transfer,
            detail.transfer.id,
            json!({
                "reference": detail.transfer.reference,
                "source_branch_id": detail.transfer.source_branch_id,
                "destination_branch_id": detail.transfer.destination_branch_id,
            }),
        ));

        Ok(detail)
    }

    async fn approve_transfer_once(
        &self,
        ctx: &ScopeContext,
        transfer_id: Uuid,
    ) -> AppResult<TransferDetail> {
        let mut tx = self.store.begin(ctx).await?;

        let transfer = tx
            .transfer(transfer_id, true)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;
        ctx.ensure_branch(transfer.destination_branch_id)?;

        if transfer.status.is_terminal() {
            return Err(AppError::TransferState {
                transfer_id,
                status: transfer.status,
            });
        }

        let now = Utc::now();
        let lines = tx.transfer_lines(transfer_id).await?;

        for (idx, line) in lines.iter().enumerate() {
            let allocation = allocate(
                &mut tx,
                line.product_id,
                transfer.source_branch_id,
                line.base_quantity()?,
            )
            .await?;

            let moved = allocation.total_taken();
            if moved <= Decimal::ZERO {
                continue;
            }

            tx.insert_batch(NewBatch {
                id: Uuid::new_v4(),
                tenant_id: ctx.tenant_id,
                product_id: line.product_id,
                branch_id: transfer.destination_branch_id,
                batch_number: transfer_batch_number(&transfer.reference, idx),
                quantity: moved,
                cost_per_unit: allocation.weighted_average_cost(),
                received_at: now,
                supplier_id: None,
                source: BatchSource::TransferIn,
            })
            .await?;
        }

        let transfer = tx
            .set_transfer_status(transfer_id, TransferStatus::Completed, now)
            .await?;
        tx.commit().await?;

        Ok(TransferDetail { transfer, lines })
    }

    /// Cancel a pending transfer. No stock moves.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn cancel_transfer(&self, ctx: &ScopeContext, transfer_id: Uuid) -> AppResult<Transfer> {
        let mut tx = self.store.begin(ctx).await?;

        let transfer = tx
            .transfer(transfer_id, true)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;
        ctx.ensure_branch(transfer.destination_branch_id)?;

        if !transfer.status.can_transition_to(TransferStatus::Cancelled) {
            return Err(AppError::TransferState {
                transfer_id,
                status: transfer.status,
            });
        }

        let transfer = tx
            .set_transfer_status(transfer_id, TransferStatus::Cancelled, Utc::now())
            .await?;
        tx.commit().await?;

        info!(reference = %transfer.reference, "Transfer cancelled");

        self.audit.record(AuditEntry::new(
            ctx.tenant_id,
            ctx.user_id,
            AuditAction::TransferCancelled,
            EntityKind::Transfer,
            transfer.id,
            json!({ "reference": transfer.reference }),
        ));

        Ok(transfer)
    }

    /// Bring one product's stock at a branch to a counted quantity.
    ///
    /// A surplus becomes a zero-cost adjustment batch, a shrinkage is taken
    /// FIFO. A difference within tolerance changes nothing and is not
    /// audited.
    #[instrument(
        skip(self, ctx, input),
        fields(tenant_id = %ctx.tenant_id, branch_id = %input.branch_id, product_id = %input.product_id)
    )]
    pub async fn reconcile_stock(
        &self,
        ctx: &ScopeContext,
        input: ReconcileInput,
    ) -> AppResult<AdjustmentResult> {
        if input.actual_quantity < Decimal::ZERO {
            return Err(AppError::validation(
                "actual_quantity",
                "Counted quantity cannot be negative",
            ));
        }
        ctx.ensure_branch(input.branch_id)?;

        let input = &input;
        let result = with_retry(&self.retry, AppError::is_retryable, move || {
            self.reconcile_once(ctx, input)
        })
        .await?;

        if result.kind == AdjustmentKind::Unchanged {
            return Ok(result);
        }

        info!(
            kind = ?result.kind,
            difference = %result.difference,
            "Stock reconciled"
        );

        self.audit.record(AuditEntry::new(
            ctx.tenant_id,
            ctx.user_id,
            AuditAction::StockReconciled,
            EntityKind::Product,
            result.product_id,
            json!({
                "branch_id": result.branch_id,
                "previous_quantity": result.previous_quantity,
                "actual_quantity": result.actual_quantity,
                "difference": result.difference,
                "batch_id": result.batch_id,
                "notes": input.notes,
            }),
        ));

        Ok(result)
    }

    async fn reconcile_once(
        &self,
        ctx: &ScopeContext,
        input: &ReconcileInput,
    ) -> AppResult<AdjustmentResult> {
        let mut tx = self.store.begin(ctx).await?;

        if tx.product(input.product_id).await?.is_none() {
            return Err(AppError::NotFound("Product".to_string()));
        }
        if tx.branch(input.branch_id).await?.is_none() {
            return Err(AppError::NotFound("Branch".to_string()));
        }

        let previous: Decimal = tx
            .lock_open_batches(input.product_id, input.branch_id)
            .await?
            .iter()
            .map(|b| b.quantity_current)
            .sum();
        let difference = input.actual_quantity - previous;

        let mut result = AdjustmentResult {
            product_id: input.product_id,
            branch_id: input.branch_id,
            kind: AdjustmentKind::Unchanged,
            previous_quantity: previous,
            actual_quantity: input.actual_quantity,
            difference,
            batch_id: None,
        };

        if is_negligible(difference) {
            tx.rollback().await?;
            return Ok(result);
        }

        if difference > Decimal::ZERO {
            let now = Utc::now();
            let id = Uuid::new_v4();
            let batch = tx
                .insert_batch(NewBatch {
                    id,
                    tenant_id: ctx.tenant_id,
                    product_id: input.product_id,
                    branch_id: input.branch_id,
                    batch_number: generate_adjustment_batch_number(now, id),
                    quantity: difference,
                    cost_per_unit: Decimal::ZERO,
                    received_at: now,
                    supplier_id: None,
                    source: BatchSource::Adjustment,
                })
                .await?;
            result.kind = AdjustmentKind::Surplus;
            result.batch_id = Some(batch.id);
        } else {
            allocate(&mut tx, input.product_id, input.branch_id, difference.abs()).await?;
            result.kind = AdjustmentKind::Shrinkage;
        }

        tx.commit().await?;
        Ok(result)
    }

    /// Reconcile every line of a count sheet, each product in its own unit
    /// of work. A failing line does not undo the others.
    #[instrument(
        skip(self, ctx, input),
        fields(tenant_id = %ctx.tenant_id, branch_id = %input.branch_id, lines = input.lines.len())
    )]
    pub async fn reconcile_count(
        &self,
        ctx: &ScopeContext,
        input: CountSheetInput,
    ) -> AppResult<Vec<CountOutcome>> {
        ctx.ensure_branch(input.branch_id)?;

        let mut outcomes = Vec::with_capacity(input.lines.len());
        for line in input.lines {
            let reconciled = self
                .reconcile_stock(
                    ctx,
                    ReconcileInput {
                        branch_id: input.branch_id,
                        product_id: line.product_id,
                        actual_quantity: line.actual_quantity,
                        notes: input.notes.clone(),
                    },
                )
                .await;

            outcomes.push(match reconciled {
                Ok(result) => CountOutcome {
                    product_id: line.product_id,
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    warn!(product_id = %line.product_id, "Count line failed: {}", e);
                    CountOutcome {
                        product_id: line.product_id,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            });
        }

        Ok(outcomes)
    }
}
