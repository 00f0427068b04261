//! Inter-branch transfer tests
//!
//! Tests for transfer creation, approval and cancellation including:
//! - Weighted-average cost carried to the destination batch
//! - Shortfalls reject the whole approval, including lines already moved
//! - Only pending transfers can be approved or cancelled

mod common;

use common::{add_product, day, dec, Ledger};
use retail_ledger::error::AppError;
use retail_ledger::services::{CreateTransferInput, TransferDetail, TransferLineInput};
use shared::{AuditAction, BatchSource, TransferStatus};
use uuid::Uuid;

async fn request(ledger: &Ledger, unit: &str, quantity: &str) -> TransferDetail {
    ledger
        .inventory
        .create_transfer(
            &ledger.at_branch(ledger.branch_a),
            CreateTransferInput {
                source_branch_id: ledger.branch_a,
                destination_branch_id: ledger.branch_b,
                lines: vec![TransferLineInput {
                    product_id: ledger.product_id,
                    unit_name: unit.to_string(),
                    quantity: dec(quantity),
                }],
                notes: Some("weekly restock".to_string()),
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_approval_preserves_weighted_cost() {
    let ledger = Ledger::new().await;
    ledger.receive(ledger.branch_a, ledger.product_id, "10", "10", day(1)).await;
    ledger.receive(ledger.branch_a, ledger.product_id, "5", "13", day(2)).await;

    let created = request(&ledger, "Pcs", "15").await;
    assert_eq!(created.transfer.status, TransferStatus::Pending);
    assert!(created.transfer.reference.starts_with("TRF-"));

    let approved = ledger
        .engine
        .approve_transfer(&ledger.at_branch(ledger.branch_b), created.transfer.id)
        .await
        .unwrap();
    assert_eq!(approved.transfer.status, TransferStatus::Completed);
    assert!(approved.transfer.received_at.is_some());

    let moved = ledger.batches(ledger.branch_b, ledger.product_id).await;
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].quantity_received, dec("15"));
    assert_eq!(moved[0].quantity_current, dec("15"));
    // (10 x 10 + 5 x 13) / 15
    assert_eq!(moved[0].cost_per_unit, dec("11"));
    assert_eq!(moved[0].source, BatchSource::TransferIn);
    assert_eq!(
        moved[0].batch_number,
        format!("{}-01", created.transfer.reference)
    );

    assert_eq!(ledger.on_hand(ledger.branch_a, ledger.product_id).await, dec("0"));
}

#[tokio::test]
async fn test_line_unit_is_converted_at_creation_factor() {
    let ledger = Ledger::new().await;
    ledger.receive(ledger.branch_a, ledger.product_id, "30", "10", day(1)).await;

    let created = request(&ledger, "Box", "2").await;
    assert_eq!(created.lines[0].conversion_factor, dec("12"));
    assert_eq!(created.lines[0].base_quantity().unwrap(), dec("24"));

    ledger
        .engine
        .approve_transfer(&ledger.head_office(), created.transfer.id)
        .await
        .unwrap();

    assert_eq!(ledger.on_hand(ledger.branch_a, ledger.product_id).await, dec("6"));
    assert_eq!(ledger.on_hand(ledger.branch_b, ledger.product_id).await, dec("24"));
}

#[tokio::test]
async fn test_shortfall_rejects_approval() {
    let ledger = Ledger::new().await;
    ledger.receive(ledger.branch_a, ledger.product_id, "5", "10", day(1)).await;

    let created = request(&ledger, "Pcs", "8").await;
    let err = ledger
        .engine
        .approve_transfer(&ledger.head_office(), created.transfer.id)
        .await
        .unwrap_err();

    match err {
        AppError::InsufficientStock { shortfall, .. } => assert_eq!(shortfall, dec("3")),
        other => panic!("expected InsufficientStock, got {:?}", other),
    }

    let stored = ledger
        .inventory
        .transfer(&ledger.head_office(), created.transfer.id)
        .await
        .unwrap();
    assert_eq!(stored.transfer.status, TransferStatus::Pending);
    assert_eq!(ledger.on_hand(ledger.branch_a, ledger.product_id).await, dec("5"));
    assert!(ledger.batches(ledger.branch_b, ledger.product_id).await.is_empty());
}

#[tokio::test]
async fn test_short_second_line_undoes_first_line() {
    let ledger = Ledger::new().await;
    let other = add_product(&ledger.store, ledger.tenant_id, "SKU-002", &[("Pcs", 1)]).await;
    ledger.receive(ledger.branch_a, ledger.product_id, "6", "10", day(1)).await;
    ledger.receive(ledger.branch_a, ledger.product_id, "6", "12", day(2)).await;
    ledger.receive(ledger.branch_a, other, "3", "50", day(1)).await;
    let before = ledger.batches(ledger.branch_a, ledger.product_id).await;

    let created = ledger
        .inventory
        .create_transfer(
            &ledger.head_office(),
            CreateTransferInput {
                source_branch_id: ledger.branch_a,
                destination_branch_id: ledger.branch_b,
                lines: vec![
                    TransferLineInput {
                        product_id: ledger.product_id,
                        unit_name: "Pcs".to_string(),
                        quantity: dec("10"),
                    },
                    TransferLineInput {
                        product_id: other,
                        unit_name: "Pcs".to_string(),
                        quantity: dec("8"),
                    },
                ],
                notes: None,
            },
        )
        .await
        .unwrap();

    let err = ledger
        .engine
        .approve_transfer(&ledger.head_office(), created.transfer.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientStock { product_id, .. } if product_id == other
    ));

    // The first line was fully allocated before the second one failed
    assert_eq!(ledger.batches(ledger.branch_a, ledger.product_id).await, before);
    assert_eq!(ledger.on_hand(ledger.branch_a, other).await, dec("3"));
    assert!(ledger.batches(ledger.branch_b, ledger.product_id).await.is_empty());
    assert!(ledger.batches(ledger.branch_b, other).await.is_empty());

    let stored = ledger
        .inventory
        .transfer(&ledger.head_office(), created.transfer.id)
        .await
        .unwrap();
    assert_eq!(stored.transfer.status, TransferStatus::Pending);
    assert!(stored.transfer.received_at.is_none());
}

#[tokio::test]
async fn test_completed_transfer_cannot_be_approved_again() {
    let ledger = Ledger::new().await;
    ledger.receive(ledger.branch_a, ledger.product_id, "20", "10", day(1)).await;

    let created = request(&ledger, "Pcs", "5").await;
    let ctx = ledger.head_office();
    ledger.engine.approve_transfer(&ctx, created.transfer.id).await.unwrap();

    let err = ledger
        .engine
        .approve_transfer(&ctx, created.transfer.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::TransferState {
            status: TransferStatus::Completed,
            ..
        }
    ));

    let cancel = ledger.engine.cancel_transfer(&ctx, created.transfer.id).await;
    assert!(matches!(cancel, Err(AppError::TransferState { .. })));

    assert_eq!(ledger.on_hand(ledger.branch_a, ledger.product_id).await, dec("15"));
    assert_eq!(ledger.on_hand(ledger.branch_b, ledger.product_id).await, dec("5"));
}

#[tokio::test]
async fn test_cancel_pending_transfer() {
    let ledger = Ledger::new().await;
    ledger.receive(ledger.branch_a, ledger.product_id, "20", "10", day(1)).await;

    let created = request(&ledger, "Pcs", "5").await;
    let cancelled = ledger
        .engine
        .cancel_transfer(&ledger.at_branch(ledger.branch_b), created.transfer.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, TransferStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
    assert!(cancelled.received_at.is_none());

    let err = ledger
        .engine
        .approve_transfer(&ledger.head_office(), created.transfer.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::TransferState {
            status: TransferStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(ledger.on_hand(ledger.branch_a, ledger.product_id).await, dec("20"));
}

#[tokio::test]
async fn test_only_destination_may_approve() {
    let ledger = Ledger::new().await;
    ledger.receive(ledger.branch_a, ledger.product_id, "20", "10", day(1)).await;

    let created = request(&ledger, "Pcs", "5").await;
    let err = ledger
        .engine
        .approve_transfer(&ledger.at_branch(ledger.branch_a), created.transfer.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BranchScope { .. }));
    assert_eq!(ledger.on_hand(ledger.branch_a, ledger.product_id).await, dec("20"));
}

#[tokio::test]
async fn test_create_transfer_validation() {
    let ledger = Ledger::new().await;
    let ctx = ledger.head_office();
    let line = |unit: &str| TransferLineInput {
        product_id: ledger.product_id,
        unit_name: unit.to_string(),
        quantity: dec("1"),
    };

    let same_branch = ledger
        .inventory
        .create_transfer(
            &ctx,
            CreateTransferInput {
                source_branch_id: ledger.branch_a,
                destination_branch_id: ledger.branch_a,
                lines: vec![line("Pcs")],
                notes: None,
            },
        )
        .await;
    assert!(matches!(same_branch, Err(AppError::Validation { .. })));

    let no_lines = ledger
        .inventory
        .create_transfer(
            &ctx,
            CreateTransferInput {
                source_branch_id: ledger.branch_a,
                destination_branch_id: ledger.branch_b,
                lines: vec![],
                notes: None,
            },
        )
        .await;
    assert!(matches!(no_lines, Err(AppError::Validation { .. })));

    let bad_unit = ledger
        .inventory
        .create_transfer(
            &ctx,
            CreateTransferInput {
                source_branch_id: ledger.branch_a,
                destination_branch_id: ledger.branch_b,
                lines: vec![line("Pallet")],
                notes: None,
            },
        )
        .await;
    assert!(matches!(bad_unit, Err(AppError::InvalidUnit { .. })));

    let unknown_branch = ledger
        .inventory
        .create_transfer(
            &ctx,
            CreateTransferInput {
                source_branch_id: ledger.branch_a,
                destination_branch_id: Uuid::new_v4(),
                lines: vec![line("Pcs")],
                notes: None,
            },
        )
        .await;
    assert!(matches!(unknown_branch, Err(AppError::NotFound(_))));

    let foreign_source = ledger
        .inventory
        .create_transfer(
            &ledger.at_branch(ledger.branch_b),
            CreateTransferInput {
                source_branch_id: ledger.branch_a,
                destination_branch_id: ledger.branch_b,
                lines: vec![line("Pcs")],
                notes: None,
            },
        )
        .await;
    assert!(matches!(foreign_source, Err(AppError::BranchScope { .. })));

    let crumb = ledger
        .inventory
        .create_transfer(
            &ctx,
            CreateTransferInput {
                source_branch_id: ledger.branch_a,
                destination_branch_id: ledger.branch_b,
                lines: vec![TransferLineInput {
                    product_id: ledger.product_id,
                    unit_name: "Pcs".to_string(),
                    quantity: dec("0.0005"),
                }],
                notes: None,
            },
        )
        .await;
    assert!(matches!(crumb, Err(AppError::Validation { field, .. }) if field == "quantity"));

    assert!(ledger.store.snapshot().await.transfers.is_empty());
}

#[tokio::test]
async fn test_transfer_lifecycle_is_audited() {
    let ledger = Ledger::new().await;
    ledger.receive(ledger.branch_a, ledger.product_id, "20", "10", day(1)).await;

    let first = request(&ledger, "Pcs", "5").await;
    let second = request(&ledger, "Pcs", "5").await;
    ledger
        .engine
        .approve_transfer(&ledger.head_office(), first.transfer.id)
        .await
        .unwrap();
    ledger
        .engine
        .cancel_transfer(&ledger.head_office(), second.transfer.id)
        .await
        .unwrap();

    let entries = ledger.audit_entries().await;
    let actions: Vec<(AuditAction, Uuid)> = entries
        .iter()
        .filter(|e| e.action != AuditAction::StockReceived)
        .map(|e| (e.action, e.entity_id))
        .collect();
    assert_eq!(
        actions,
        vec![
            (AuditAction::TransferCreated, first.transfer.id),
            (AuditAction::TransferCreated, second.transfer.id),
            (AuditAction::TransferApproved, first.transfer.id),
            (AuditAction::TransferCancelled, second.transfer.id),
        ]
    );
}
