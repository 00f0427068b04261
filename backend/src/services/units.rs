//! Resolves a named unit for a product inside a unit of work and converts
//! requested quantities to base units

use rust_decimal::Decimal;
use shared::{is_negligible, resolve_unit, to_base_units, Product, ProductUnit};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::LedgerTx;

/// Load `product_id` and its unit called `unit_name`.
///
/// Fails with `NotFound` for an unknown product and `InvalidUnit` when the
/// product has no unit of that name.
pub async fn resolve_product_unit<T: LedgerTx>(
    tx: &mut T,
    product_id: Uuid,
    unit_name: &str,
) -> AppResult<(Product, ProductUnit)> {
    let product = tx
        .product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    let units = tx.product_units(product_id).await?;
    let unit = resolve_unit(&units, product_id, unit_name)?.clone();

    Ok((product, unit))
}

/// Base quantity of `quantity` in `unit`, rejecting amounts too large to
/// represent or too small to count as stock
pub fn base_quantity_of(unit: &ProductUnit, quantity: Decimal) -> AppResult<Decimal> {
    let base = to_base_units(unit, quantity)?;
    if is_negligible(base) {
        return Err(AppError::validation(
            "quantity",
            format!("{} {} is below the smallest stock quantity", quantity, unit.name),
        ));
    }
    Ok(base)
}
