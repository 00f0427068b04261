//! Postgres-backed ledger store
//!
//! Each unit of work is one database transaction. `begin` sets the
//! transaction-local `app.tenant_id` and `app.user_id` settings read by the
//! row-level-security policies, and every statement also filters on
//! `tenant_id` explicitly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::{
    Batch, Branch, NewBatch, Product, ProductUnit, SaleSettlement, SaleSettlementLine, StockLevel,
    Transfer, TransferLine, TransferStatus,
};

use super::{LedgerStore, LedgerTx};
use crate::error::{AppError, AppResult};
use crate::scope::ScopeContext;

#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
}

impl PgLedgerStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    async fn begin(&self, ctx: &ScopeContext) -> AppResult<Self::Tx> {
        let mut tx = self.db.begin().await?;

        sqlx::query("SELECT set_config('app.tenant_id', $1, true), set_config('app.user_id', $2, true)")
            .bind(ctx.tenant_id.to_string())
            .bind(ctx.user_id.to_string())
            .execute(&mut *tx)
            .await?;

        Ok(PgLedgerTx { tx, ctx: *ctx })
    }
}

pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
    ctx: ScopeContext,
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    tenant_id: Uuid,
    sku: String,
    name: String,
    category: Option<String>,
    min_stock: Decimal,
    base_unit: String,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            sku: row.sku,
            name: row.name,
            category: row.category,
            min_stock: row.min_stock,
            base_unit: row.base_unit,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductUnitRow {
    id: Uuid,
    product_id: Uuid,
    name: String,
    conversion_factor: Decimal,
    price: Decimal,
    barcode: Option<String>,
}

impl From<ProductUnitRow> for ProductUnit {
    fn from(row: ProductUnitRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            conversion_factor: row.conversion_factor,
            price: row.price,
            barcode: row.barcode,
        }
    }
}

#[derive(Debug, FromRow)]
struct BranchRow {
    id: Uuid,
    tenant_id: Uuid,
    code: String,
    name: String,
}

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    seq: i64,
    tenant_id: Uuid,
    product_id: Uuid,
    branch_id: Uuid,
    batch_number: String,
    quantity_received: Decimal,
    quantity_current: Decimal,
    cost_per_unit: Decimal,
    received_at: DateTime<Utc>,
    supplier_id: Option<Uuid>,
    source: String,
    version: i32,
}

impl TryFrom<BatchRow> for Batch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            sequence: row.seq,
            tenant_id: row.tenant_id,
            product_id: row.product_id,
            branch_id: row.branch_id,
            batch_number: row.batch_number,
            quantity_received: row.quantity_received,
            quantity_current: row.quantity_current,
            cost_per_unit: row.cost_per_unit,
            received_at: row.received_at,
            supplier_id: row.supplier_id,
            source: row.source.parse()?,
            version: row.version,
        })
    }
}

#[derive(Debug, FromRow)]
struct StockLevelRow {
    product_id: Uuid,
    sku: String,
    name: String,
    base_unit: String,
    on_hand: Decimal,
    value: Decimal,
    open_batches: i64,
    min_stock: Decimal,
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    tenant_id: Uuid,
    branch_id: Uuid,
    cashier_id: Uuid,
    invoice_number: String,
    total_amount: Decimal,
    total_cost: Decimal,
    payment_method: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SaleRow> for SaleSettlement {
    type Error = AppError;

    fn try_from(row: SaleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            branch_id: row.branch_id,
            cashier_id: row.cashier_id,
            invoice_number: row.invoice_number,
            total_amount: row.total_amount,
            total_cost: row.total_cost,
            payment_method: row.payment_method.parse()?,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SaleLineRow {
    id: Uuid,
    sale_id: Uuid,
    product_id: Uuid,
    batch_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
    cost_per_unit: Decimal,
    subtotal: Decimal,
    unit_name: String,
    conversion_factor: Decimal,
}

impl From<SaleLineRow> for SaleSettlementLine {
    fn from(row: SaleLineRow) -> Self {
        Self {
            id: row.id,
            sale_id: row.sale_id,
            product_id: row.product_id,
            batch_id: row.batch_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            cost_per_unit: row.cost_per_unit,
            subtotal: row.subtotal,
            unit_name: row.unit_name,
            conversion_factor: row.conversion_factor,
        }
    }
}

#[derive(Debug, FromRow)]
struct TransferRow {
    id: Uuid,
    tenant_id: Uuid,
    reference: String,
    source_branch_id: Uuid,
    destination_branch_id: Uuid,
    status: String,
    notes: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    received_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransferRow> for Transfer {
    type Error = AppError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            reference: row.reference,
            source_branch_id: row.source_branch_id,
            destination_branch_id: row.destination_branch_id,
            status: row.status.parse()?,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
            received_at: row.received_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TransferLineRow {
    id: Uuid,
    transfer_id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    unit_name: String,
    conversion_factor: Decimal,
}

impl From<TransferLineRow> for TransferLine {
    fn from(row: TransferLineRow) -> Self {
        Self {
            id: row.id,
            transfer_id: row.transfer_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_name: row.unit_name,
            conversion_factor: row.conversion_factor,
        }
    }
}

// ============================================================================
// Transaction
// ============================================================================

#[async_trait]
impl LedgerTx for PgLedgerTx {
    fn context(&self) -> &ScopeContext {
        &self.ctx
    }

    async fn product(&mut self, product_id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, tenant_id, sku, name, category, min_stock, base_unit, created_at
            FROM products
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(product_id)
        .bind(self.ctx.tenant_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn product_units(&mut self, product_id: Uuid) -> AppResult<Vec<ProductUnit>> {
        let rows = sqlx::query_as::<_, ProductUnitRow>(
            r#"
            SELECT pu.id, pu.product_id, pu.name, pu.conversion_factor, pu.price, pu.barcode
            FROM product_units pu
            JOIN products p ON p.id = pu.product_id
            WHERE pu.product_id = $1 AND p.tenant_id = $2
            ORDER BY pu.conversion_factor ASC
            "#,
        )
        .bind(product_id)
        .bind(self.ctx.tenant_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn branch(&mut self, branch_id: Uuid) -> AppResult<Option<Branch>> {
        let row = sqlx::query_as::<_, BranchRow>(
            "SELECT id, tenant_id, code, name FROM branches WHERE id = $1 AND tenant_id = $2",
        )
        .bind(branch_id)
        .bind(self.ctx.tenant_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| Branch {
            id: r.id,
            tenant_id: r.tenant_id,
            code: r.code,
            name: r.name,
        }))
    }

    async fn lock_open_batches(
        &mut self,
        product_id: Uuid,
        branch_id: Uuid,
    ) -> AppResult<Vec<Batch>> {
        // Rows are locked in the order returned, so concurrent allocators
        // always contend on the oldest batch first.
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, seq, tenant_id, product_id, branch_id, batch_number, quantity_received,
                   quantity_current, cost_per_unit, received_at, supplier_id, source, version
            FROM batches
            WHERE tenant_id = $1 AND product_id = $2 AND branch_id = $3
              AND quantity_current > 0
            ORDER BY received_at ASC, seq ASC
            FOR UPDATE
            "#,
        )
        .bind(self.ctx.tenant_id)
        .bind(product_id)
        .bind(branch_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Batch::try_from).collect()
    }

    async fn list_batches(&mut self, product_id: Uuid, branch_id: Uuid) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, seq, tenant_id, product_id, branch_id, batch_number, quantity_received,
                   quantity_current, cost_per_unit, received_at, supplier_id, source, version
            FROM batches
            WHERE tenant_id = $1 AND product_id = $2 AND branch_id = $3
            ORDER BY received_at ASC, seq ASC
            "#,
        )
        .bind(self.ctx.tenant_id)
        .bind(product_id)
        .bind(branch_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Batch::try_from).collect()
    }

    async fn consume_batch(&mut self, batch: &Batch, quantity: Decimal) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE batches
            SET quantity_current = quantity_current - $1, version = version + 1
            WHERE id = $2 AND tenant_id = $3 AND version = $4 AND quantity_current >= $1
            "#,
        )
        .bind(quantity)
        .bind(batch.id)
        .bind(self.ctx.tenant_id)
        .bind(batch.version)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrentModification(format!(
                "batch {} changed during allocation",
                batch.batch_number
            )));
        }

        Ok(())
    }

    async fn insert_batch(&mut self, batch: NewBatch) -> AppResult<Batch> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            INSERT INTO batches (
                id, tenant_id, product_id, branch_id, batch_number, quantity_received,
                quantity_current, cost_per_unit, received_at, supplier_id, source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8, $9, $10)
            RETURNING id, seq, tenant_id, product_id, branch_id, batch_number, quantity_received,
                      quantity_current, cost_per_unit, received_at, supplier_id, source, version
            "#,
        )
        .bind(batch.id)
        .bind(batch.tenant_id)
        .bind(batch.product_id)
        .bind(batch.branch_id)
        .bind(&batch.batch_number)
        .bind(batch.quantity)
        .bind(batch.cost_per_unit)
        .bind(batch.received_at)
        .bind(batch.supplier_id)
        .bind(batch.source.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn stock_levels(&mut self, branch_id: Uuid) -> AppResult<Vec<StockLevel>> {
        let rows = sqlx::query_as::<_, StockLevelRow>(
            r#"
            SELECT p.id AS product_id, p.sku, p.name, p.base_unit, p.min_stock,
                   COALESCE(SUM(b.quantity_current), 0) AS on_hand,
                   COALESCE(SUM(b.quantity_current * b.cost_per_unit), 0) AS value,
                   COUNT(b.id) FILTER (WHERE b.quantity_current > 0) AS open_batches
            FROM products p
            LEFT JOIN batches b
                   ON b.product_id = p.id AND b.branch_id = $2 AND b.tenant_id = p.tenant_id
            WHERE p.tenant_id = $1
            GROUP BY p.id, p.sku, p.name, p.base_unit, p.min_stock
            ORDER BY p.sku
            "#,
        )
        .bind(self.ctx.tenant_id)
        .bind(branch_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| StockLevel {
                product_id: r.product_id,
                branch_id,
                sku: r.sku,
                name: r.name,
                base_unit: r.base_unit,
                on_hand: r.on_hand,
                value: r.value,
                open_batches: r.open_batches,
                low_stock: r.on_hand <= r.min_stock,
                min_stock: r.min_stock,
            })
            .collect())
    }

    async fn insert_sale(
        &mut self,
        sale: &SaleSettlement,
        lines: &[SaleSettlementLine],
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, branch_id, cashier_id, invoice_number, total_amount,
                total_cost, payment_method, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(sale.id)
        .bind(sale.tenant_id)
        .bind(sale.branch_id)
        .bind(sale.cashier_id)
        .bind(&sale.invoice_number)
        .bind(sale.total_amount)
        .bind(sale.total_cost)
        .bind(sale.payment_method.as_str())
        .bind(sale.status.as_str())
        .bind(sale.created_at)
        .execute(&mut *self.tx)
        .await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (
                    id, sale_id, product_id, batch_id, quantity, unit_price, cost_per_unit,
                    subtotal, unit_name, conversion_factor
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(line.id)
            .bind(line.sale_id)
            .bind(line.product_id)
            .bind(line.batch_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.cost_per_unit)
            .bind(line.subtotal)
            .bind(&line.unit_name)
            .bind(line.conversion_factor)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn sale(
        &mut self,
        sale_id: Uuid,
    ) -> AppResult<Option<(SaleSettlement, Vec<SaleSettlementLine>)>> {
        let Some(row) = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT id, tenant_id, branch_id, cashier_id, invoice_number, total_amount,
                   total_cost, payment_method, status, created_at
            FROM sales
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(sale_id)
        .bind(self.ctx.tenant_id)
        .fetch_optional(&mut *self.tx)
        .await?
        else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, SaleLineRow>(
            r#"
            SELECT id, sale_id, product_id, batch_id, quantity, unit_price, cost_per_unit,
                   subtotal, unit_name, conversion_factor
            FROM sale_lines
            WHERE sale_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Some((
            row.try_into()?,
            lines.into_iter().map(Into::into).collect(),
        )))
    }

    async fn insert_transfer(
        &mut self,
        transfer: &Transfer,
        lines: &[TransferLine],
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transfers (
                id, tenant_id, reference, source_branch_id, destination_branch_id, status,
                notes, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(transfer.id)
        .bind(transfer.tenant_id)
        .bind(&transfer.reference)
        .bind(transfer.source_branch_id)
        .bind(transfer.destination_branch_id)
        .bind(transfer.status.as_str())
        .bind(&transfer.notes)
        .bind(transfer.created_by)
        .bind(transfer.created_at)
        .execute(&mut *self.tx)
        .await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO transfer_lines (
                    id, transfer_id, product_id, quantity, unit_name, conversion_factor
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(line.id)
            .bind(line.transfer_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(&line.unit_name)
            .bind(line.conversion_factor)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn transfer(
        &mut self,
        transfer_id: Uuid,
        for_update: bool,
    ) -> AppResult<Option<Transfer>> {
        let sql = if for_update {
            r#"
            SELECT id, tenant_id, reference, source_branch_id, destination_branch_id, status,
                   notes, created_by, created_at, received_at, cancelled_at
            FROM transfers
            WHERE id = $1 AND tenant_id = $2
            FOR UPDATE
            "#
        } else {
            r#"
            SELECT id, tenant_id, reference, source_branch_id, destination_branch_id, status,
                   notes, created_by, created_at, received_at, cancelled_at
            FROM transfers
            WHERE id = $1 AND tenant_id = $2
            "#
        };

        let row = sqlx::query_as::<_, TransferRow>(sql)
            .bind(transfer_id)
            .bind(self.ctx.tenant_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(Transfer::try_from).transpose()
    }

    async fn transfer_lines(&mut self, transfer_id: Uuid) -> AppResult<Vec<TransferLine>> {
        let rows = sqlx::query_as::<_, TransferLineRow>(
            r#"
            SELECT id, transfer_id, product_id, quantity, unit_name, conversion_factor
            FROM transfer_lines
            WHERE transfer_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(transfer_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_transfer_status(
        &mut self,
        transfer_id: Uuid,
        status: TransferStatus,
        at: DateTime<Utc>,
    ) -> AppResult<Transfer> {
        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            UPDATE transfers
            SET status = $1,
                received_at = CASE WHEN $1 = 'completed' THEN $2 ELSE received_at END,
                cancelled_at = CASE WHEN $1 = 'cancelled' THEN $2 ELSE cancelled_at END
            WHERE id = $3 AND tenant_id = $4 AND status = 'pending'
            RETURNING id, tenant_id, reference, source_branch_id, destination_branch_id, status,
                      notes, created_by, created_at, received_at, cancelled_at
            "#,
        )
        .bind(status.as_str())
        .bind(at)
        .bind(transfer_id)
        .bind(self.ctx.tenant_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current = self
                    .transfer(transfer_id, false)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;
                Err(AppError::TransferState {
                    transfer_id,
                    status: current.status,
                })
            }
        }
    }

    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
