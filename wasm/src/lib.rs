//! WebAssembly module for the retail ledger point of sale
//!
//! Provides client-side computation for:
//! - Unit conversion against a product's unit set
//! - Cart line amounts and totals with the ledger's money rounding
//! - Offline validation of cart lines before checkout
//!
//! Decimal values cross the boundary as strings so no precision is lost to
//! JavaScript numbers.

use std::str::FromStr;

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::units::*;
pub use shared::validation::*;

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

fn to_js_error(message: String) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(&message));
    JsValue::from_str(&message)
}

fn base_quantity(units_json: &str, unit_name: &str, quantity: &str) -> Result<Decimal, String> {
    let units: Vec<ProductUnit> =
        serde_json::from_str(units_json).map_err(|e| format!("Invalid units JSON: {}", e))?;
    let product_id = units.first().map(|u| u.product_id).unwrap_or_default();
    let unit = resolve_unit(&units, product_id, unit_name).map_err(|e| e.to_string())?;
    to_base_units(unit, parse_decimal("quantity", quantity)?).map_err(|e| e.to_string())
}

fn cart_amount(lines_json: &str) -> Result<Decimal, String> {
    let lines: Vec<CartLine> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid cart JSON: {}", e))?;
    lines.iter().try_fold(Decimal::ZERO, |total, line| {
        validate_positive_quantity(&line.quantity).map_err(|e| e.to_string())?;
        validate_non_negative_amount(&line.unit_price).map_err(|e| e.to_string())?;
        checked_line_amount(line.quantity, line.unit_price)
            .and_then(|amount| total.checked_add(amount))
            .ok_or_else(|| "Cart total is out of range".to_string())
    })
}

/// Convert a quantity in a named unit into base units.
/// `units_json` is the product's unit list.
#[wasm_bindgen]
pub fn to_base_quantity(units_json: &str, unit_name: &str, quantity: &str) -> Result<String, JsValue> {
    base_quantity(units_json, unit_name, quantity)
        .map(|q| q.normalize().to_string())
        .map_err(to_js_error)
}

/// Amount of one cart line, rounded to money precision
#[wasm_bindgen]
pub fn line_amount(quantity: &str, unit_price: &str) -> Result<String, JsValue> {
    let quantity = parse_decimal("quantity", quantity).map_err(to_js_error)?;
    let unit_price = parse_decimal("unit price", unit_price).map_err(to_js_error)?;
    checked_line_amount(quantity, unit_price)
        .map(|amount| amount.to_string())
        .ok_or_else(|| to_js_error("Line amount is out of range".to_string()))
}

/// Total of a cart given as a JSON list of cart lines
#[wasm_bindgen]
pub fn cart_total(lines_json: &str) -> Result<String, JsValue> {
    cart_amount(lines_json)
        .map(|t| t.to_string())
        .map_err(to_js_error)
}

/// Whether two base quantities are equal within the ledger's tolerance
#[wasm_bindgen]
pub fn same_quantity(a: &str, b: &str) -> bool {
    match (parse_decimal("a", a), parse_decimal("b", b)) {
        (Ok(a), Ok(b)) => quantities_equal(a, b),
        _ => false,
    }
}

/// Split an amount across weights the way checkout splits a line over
/// batches. Returns the shares as strings.
#[wasm_bindgen]
pub fn split_amount(total: &str, weights: Vec<String>) -> Result<js_sys::Array, JsValue> {
    let total = parse_decimal("total", total).map_err(to_js_error)?;
    let weights = weights
        .iter()
        .map(|w| parse_decimal("weight", w))
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_js_error)?;
    if weights
        .iter()
        .try_fold(Decimal::ZERO, |sum, w| sum.checked_add(*w))
        .is_none()
    {
        return Err(to_js_error("Weights are out of range".to_string()));
    }

    Ok(split_money(total, &weights)
        .into_iter()
        .map(|share| JsValue::from_str(&share.to_string()))
        .collect())
}
