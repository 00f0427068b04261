//! Unit conversion rules
//!
//! Every product has one canonical base unit (factor 1) and any number of
//! alternate units expressed as "base units per one of this unit". Stock is
//! always stored in base units; sale and transfer quantities are converted on
//! the way in and out.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ProductUnit;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("unit '{unit}' is not defined for product {product_id}")]
    InvalidUnit { product_id: Uuid, unit: String },

    #[error("unit '{unit}' has non-positive conversion factor {factor}")]
    NonPositiveFactor { unit: String, factor: Decimal },

    #[error("product must have exactly one base unit, found {found}")]
    BaseUnitCount { found: usize },

    #[error("unit '{unit}' is defined more than once")]
    DuplicateUnit { unit: String },

    #[error("base unit '{unit}' is not a unit of the product with factor 1")]
    BaseUnitMismatch { unit: String },

    #[error("quantity {quantity} {unit} is out of range")]
    QuantityOutOfRange { unit: String, quantity: Decimal },
}

/// Scale a quantity by a conversion factor, failing instead of overflowing
pub fn scale_to_base(
    quantity: Decimal,
    factor: Decimal,
    unit: &str,
) -> Result<Decimal, UnitError> {
    quantity
        .checked_mul(factor)
        .ok_or_else(|| UnitError::QuantityOutOfRange {
            unit: unit.to_string(),
            quantity,
        })
}

/// Convert a quantity in `unit` to base units
pub fn to_base_units(unit: &ProductUnit, quantity: Decimal) -> Result<Decimal, UnitError> {
    scale_to_base(quantity, unit.conversion_factor, &unit.name)
}

/// Convert a base-unit quantity to a quantity in `unit`
pub fn from_base_units(unit: &ProductUnit, base_quantity: Decimal) -> Decimal {
    base_quantity / unit.conversion_factor
}

/// Cost of one `unit` given the cost of one base unit
pub fn base_cost_to_unit_cost(cost_per_base: Decimal, unit: &ProductUnit) -> Decimal {
    cost_per_base * unit.conversion_factor
}

/// Cost of one base unit given the cost of one `unit`
pub fn unit_cost_to_base_cost(cost_per_unit: Decimal, unit: &ProductUnit) -> Decimal {
    cost_per_unit / unit.conversion_factor
}

/// Find a product's unit by name (case-insensitive)
pub fn resolve_unit<'a>(
    units: &'a [ProductUnit],
    product_id: Uuid,
    name: &str,
) -> Result<&'a ProductUnit, UnitError> {
    let wanted = name.trim();
    units
        .iter()
        .filter(|u| u.product_id == product_id)
        .find(|u| u.name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| UnitError::InvalidUnit {
            product_id,
            unit: wanted.to_string(),
        })
}

/// Check a product's unit set: positive factors, unique names, one base
/// unit, and `base_unit` naming that unit
pub fn validate_unit_set(base_unit: &str, units: &[ProductUnit]) -> Result<(), UnitError> {
    let mut seen: Vec<String> = Vec::with_capacity(units.len());
    for unit in units {
        if unit.conversion_factor <= Decimal::ZERO {
            return Err(UnitError::NonPositiveFactor {
                unit: unit.name.clone(),
                factor: unit.conversion_factor,
            });
        }
        let key = unit.name.trim().to_ascii_lowercase();
        if seen.contains(&key) {
            return Err(UnitError::DuplicateUnit {
                unit: unit.name.clone(),
            });
        }
        seen.push(key);
    }

    let base_units = units.iter().filter(|u| u.is_base()).count();
    if base_units != 1 {
        return Err(UnitError::BaseUnitCount { found: base_units });
    }

    let named = units
        .iter()
        .find(|u| u.name.trim().eq_ignore_ascii_case(base_unit.trim()));
    match named {
        Some(unit) if unit.is_base() => Ok(()),
        _ => Err(UnitError::BaseUnitMismatch {
            unit: base_unit.to_string(),
        }),
    }
}
