//! WebAssembly module for the Alufab back office
//!
//! Provides client-side computation for the quotation screens:
//! - Glass formula checks while a template is edited
//! - Glass size and area previews
//! - Reference weight estimates before stock is weighed

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

use shared::{
    calculate_glass_area_with_quantity, estimate_reference_weight, evaluate, validate_formula,
    GlassAreaRequest, RoundingPolicy, HEIGHT_VARIABLE, WIDTH_VARIABLE,
};

fn to_js_error(message: String) -> JsValue {
    js_sys::Error::new(&message).into()
}

fn decimal_from_f64(value: f64, field: &str) -> Result<Decimal, String> {
    Decimal::try_from(value).map_err(|_| format!("{} is not a finite number", field))
}

fn evaluate_window_formula(expression: &str, width: f64, height: f64) -> Result<f64, String> {
    let bindings = HashMap::from([
        (WIDTH_VARIABLE.to_string(), decimal_from_f64(width, "width")?),
        (HEIGHT_VARIABLE.to_string(), decimal_from_f64(height, "height")?),
    ]);
    let value = evaluate(expression, &bindings).map_err(|e| e.to_string())?;
    value
        .to_f64()
        .ok_or_else(|| format!("Result of '{}' cannot be shown as a number", expression))
}

fn glass_area_json(request_json: &str, rounding_increment: Option<String>) -> Result<String, String> {
    let request: GlassAreaRequest =
        serde_json::from_str(request_json).map_err(|e| format!("Invalid glass request JSON: {}", e))?;
    let policy = match rounding_increment {
        Some(increment) => {
            let increment = Decimal::from_str(&increment)
                .map_err(|_| format!("Invalid rounding increment '{}'", increment))?;
            RoundingPolicy::new(increment).map_err(|e| e.to_string())?
        }
        None => RoundingPolicy::default(),
    };
    let result = calculate_glass_area_with_quantity(&request, &policy).map_err(|e| e.to_string())?;
    serde_json::to_string(&result).map_err(|e| e.to_string())
}

/// Evaluate a glass formula against a window size
#[wasm_bindgen]
pub fn evaluate_glass_formula(expression: &str, width: f64, height: f64) -> Result<f64, JsValue> {
    evaluate_window_formula(expression, width, height).map_err(to_js_error)
}

/// Check that a formula parses and only uses `W` and `H`
#[wasm_bindgen]
pub fn is_valid_glass_formula(expression: &str) -> bool {
    validate_formula(expression, &[WIDTH_VARIABLE, HEIGHT_VARIABLE]).is_ok()
}

/// Calculate glass sizes and area; takes and returns JSON
#[wasm_bindgen]
pub fn calculate_glass_area(request_json: &str, rounding_increment: Option<String>) -> Result<String, JsValue> {
    glass_area_json(request_json, rounding_increment).map_err(to_js_error)
}

/// Estimate weight from a reference per-piece gauge weight
#[wasm_bindgen]
pub fn estimate_gauge_weight(reference_unit_weight: f64, quantity: u32) -> Result<f64, JsValue> {
    let unit = decimal_from_f64(reference_unit_weight, "reference_unit_weight").map_err(to_js_error)?;
    estimate_reference_weight(unit, quantity)
        .and_then(|w| w.to_f64())
        .ok_or_else(|| to_js_error("Estimated weight is too large".to_string()))
}
