//! Stock reconciliation tests
//!
//! Tests for stock counts including:
//! - Surplus creates a zero-cost adjustment batch
//! - Shrinkage is taken oldest batch first
//! - Reconciling to the same count twice is a no-op the second time
//! - Count sheets settle each product independently

mod common;

use common::{add_product, day, dec, Ledger};
use retail_ledger::error::AppError;
use retail_ledger::services::{AdjustmentKind, CountLine, CountSheetInput, ReconcileInput};
use rust_decimal::Decimal;
use shared::{AuditAction, BatchSource};
use uuid::Uuid;

fn count(ledger: &Ledger, actual: &str) -> ReconcileInput {
    ReconcileInput {
        branch_id: ledger.branch_a,
        product_id: ledger.product_id,
        actual_quantity: dec(actual),
        notes: Some("monthly opname".to_string()),
    }
}

async fn stocked() -> Ledger {
    let ledger = Ledger::new().await;
    ledger.receive(ledger.branch_a, ledger.product_id, "5", "100", day(1)).await;
    ledger.receive(ledger.branch_a, ledger.product_id, "5", "120", day(2)).await;
    ledger
}

#[tokio::test]
async fn test_surplus_creates_adjustment_batch() {
    let ledger = stocked().await;

    let result = ledger
        .engine
        .reconcile_stock(&ledger.at_branch(ledger.branch_a), count(&ledger, "13"))
        .await
        .unwrap();

    assert_eq!(result.kind, AdjustmentKind::Surplus);
    assert_eq!(result.previous_quantity, dec("10"));
    assert_eq!(result.difference, dec("3"));

    let batches = ledger.batches(ledger.branch_a, ledger.product_id).await;
    assert_eq!(batches.len(), 3);
    let adjustment = batches
        .iter()
        .find(|b| Some(b.id) == result.batch_id)
        .unwrap();
    assert_eq!(adjustment.source, BatchSource::Adjustment);
    assert_eq!(adjustment.cost_per_unit, Decimal::ZERO);
    assert_eq!(adjustment.quantity_current, dec("3"));
    assert!(adjustment.batch_number.starts_with("ADJ-"));
    assert_eq!(ledger.on_hand(ledger.branch_a, ledger.product_id).await, dec("13"));
}

#[tokio::test]
async fn test_shrinkage_is_taken_fifo() {
    let ledger = stocked().await;

    let result = ledger
        .engine
        .reconcile_stock(&ledger.head_office(), count(&ledger, "7"))
        .await
        .unwrap();

    assert_eq!(result.kind, AdjustmentKind::Shrinkage);
    assert_eq!(result.difference, dec("-3"));
    assert!(result.batch_id.is_none());

    let batches = ledger.batches(ledger.branch_a, ledger.product_id).await;
    assert_eq!(batches[0].quantity_current, dec("2"));
    assert_eq!(batches[1].quantity_current, dec("5"));
}

#[tokio::test]
async fn test_count_to_zero_empties_every_batch() {
    let ledger = stocked().await;

    ledger
        .engine
        .reconcile_stock(&ledger.head_office(), count(&ledger, "0"))
        .await
        .unwrap();

    let batches = ledger.batches(ledger.branch_a, ledger.product_id).await;
    assert!(batches.iter().all(|b| b.quantity_current == Decimal::ZERO));
}

#[tokio::test]
async fn test_second_identical_count_is_noop() {
    let ledger = stocked().await;
    let ctx = ledger.head_office();

    let first = ledger
        .engine
        .reconcile_stock(&ctx, count(&ledger, "7"))
        .await
        .unwrap();
    let before = ledger.store.snapshot().await;
    let second = ledger
        .engine
        .reconcile_stock(&ctx, count(&ledger, "7"))
        .await
        .unwrap();

    assert_eq!(first.kind, AdjustmentKind::Shrinkage);
    assert_eq!(second.kind, AdjustmentKind::Unchanged);
    assert_eq!(second.difference, Decimal::ZERO);
    assert_eq!(before.batches, ledger.store.snapshot().await.batches);

    let entries = ledger.audit_entries().await;
    let reconciled = entries
        .iter()
        .filter(|e| e.action == AuditAction::StockReconciled)
        .count();
    assert_eq!(reconciled, 1);
}

#[tokio::test]
async fn test_difference_within_tolerance_is_unchanged() {
    let ledger = stocked().await;

    let result = ledger
        .engine
        .reconcile_stock(&ledger.head_office(), count(&ledger, "10.0005"))
        .await
        .unwrap();

    assert_eq!(result.kind, AdjustmentKind::Unchanged);
    assert_eq!(ledger.batches(ledger.branch_a, ledger.product_id).await.len(), 2);
}

#[tokio::test]
async fn test_negative_count_is_rejected() {
    let ledger = stocked().await;

    let err = ledger
        .engine
        .reconcile_stock(&ledger.head_office(), count(&ledger, "-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_count_outside_own_branch_is_rejected() {
    let ledger = stocked().await;

    let err = ledger
        .engine
        .reconcile_stock(&ledger.at_branch(ledger.branch_b), count(&ledger, "3"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BranchScope { .. }));
    assert_eq!(ledger.on_hand(ledger.branch_a, ledger.product_id).await, dec("10"));
}

#[tokio::test]
async fn test_count_sheet_settles_lines_independently() {
    let ledger = stocked().await;
    let empty = add_product(&ledger.store, ledger.tenant_id, "SKU-002", &[("Pcs", 1)]).await;
    let missing = Uuid::new_v4();

    let outcomes = ledger
        .engine
        .reconcile_count(
            &ledger.at_branch(ledger.branch_a),
            CountSheetInput {
                branch_id: ledger.branch_a,
                lines: vec![
                    CountLine {
                        product_id: ledger.product_id,
                        actual_quantity: dec("12"),
                    },
                    CountLine {
                        product_id: missing,
                        actual_quantity: dec("4"),
                    },
                    CountLine {
                        product_id: empty,
                        actual_quantity: dec("0"),
                    },
                ],
                notes: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);

    let surplus = outcomes[0].result.as_ref().unwrap();
    assert_eq!(surplus.kind, AdjustmentKind::Surplus);
    assert_eq!(surplus.difference, dec("2"));

    assert_eq!(outcomes[1].product_id, missing);
    assert!(outcomes[1].result.is_none());
    assert!(outcomes[1].error.is_some());

    assert_eq!(
        outcomes[2].result.as_ref().map(|r| r.kind),
        Some(AdjustmentKind::Unchanged)
    );

    // The failed line did not undo the first one
    assert_eq!(ledger.on_hand(ledger.branch_a, ledger.product_id).await, dec("12"));
}
