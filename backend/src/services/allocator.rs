//! FIFO allocation over a product's batches at one branch
//!
//! The allocator mutates the ledger through the caller's unit of work and is
//! not transactional on its own: a failure later in the same workflow must
//! roll the whole unit of work back.

use rust_decimal::Decimal;
use shared::{Allocation, AllocationFragment, QUANTITY_TOLERANCE};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::LedgerTx;

/// Take `required` base units from the oldest batches first.
///
/// Availability is checked against the locked candidate set before any
/// batch is touched, so an `InsufficientStock` failure leaves every batch
/// unchanged. Each decrement is a compare-and-swap on the batch version.
pub async fn allocate<T: LedgerTx>(
    tx: &mut T,
    product_id: Uuid,
    branch_id: Uuid,
    required: Decimal,
) -> AppResult<Allocation> {
    if required <= QUANTITY_TOLERANCE {
        return Err(AppError::validation(
            "quantity",
            format!("Allocation quantity must exceed {}", QUANTITY_TOLERANCE),
        ));
    }

    let batches = tx.lock_open_batches(product_id, branch_id).await?;

    let available: Decimal = batches.iter().map(|b| b.quantity_current).sum();
    if required - available > QUANTITY_TOLERANCE {
        debug!(
            tenant_id = %tx.context().tenant_id,
            product_id = %product_id,
            branch_id = %branch_id,
            available = %available,
            "Allocation short"
        );
        return Err(AppError::InsufficientStock {
            product_id,
            branch_id,
            requested: required,
            shortfall: required - available,
        });
    }

    let mut remaining = required;
    let mut fragments = Vec::new();

    for batch in &batches {
        if remaining <= QUANTITY_TOLERANCE {
            break;
        }

        let taken = batch.quantity_current.min(remaining);
        if taken <= Decimal::ZERO {
            continue;
        }

        tx.consume_batch(batch, taken).await?;
        debug!(
            batch = %batch.batch_number,
            taken = %taken,
            left = %(batch.quantity_current - taken),
            "Consumed batch"
        );

        fragments.push(AllocationFragment {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            quantity: taken,
            cost_per_unit: batch.cost_per_unit,
        });
        remaining -= taken;
    }

    Ok(Allocation {
        product_id,
        branch_id,
        requested: required,
        fragments,
    })
}
