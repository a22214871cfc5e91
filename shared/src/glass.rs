//! Glass area calculation for quotations and estimates
//!
//! Width and height come from two independent formulas over the window size
//! (`W`, `H`). Each dimension is rounded to a manufacturable increment on its
//! own before the area is computed, and every intermediate value is returned
//! so an estimate can be checked by hand.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{Dimension, GlassError};
use crate::formula::Formula;
use crate::types::{convert_area, AreaUnit, LengthUnit};
use crate::validation::{validate_glass_quantity, validate_rounding_increment};

/// Variable bound to the window width
pub const WIDTH_VARIABLE: &str = "W";
/// Variable bound to the window height
pub const HEIGHT_VARIABLE: &str = "H";

/// Rounding applied to computed glass dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundingPolicy {
    increment: Decimal,
}

impl RoundingPolicy {
    /// Quarter-unit rounding used by the cutting tables
    pub fn quarter_unit() -> Self {
        Self {
            increment: Decimal::new(25, 2),
        }
    }

    pub fn new(increment: Decimal) -> Result<Self, GlassError> {
        validate_rounding_increment(increment)
            .map_err(|message| GlassError::validation("rounding_increment", message))?;
        Ok(Self { increment })
    }

    pub fn increment(&self) -> Decimal {
        self.increment
    }

    /// Round to the nearest multiple of the increment, halves away from zero
    pub fn round(&self, value: Decimal) -> Option<Decimal> {
        let steps = value
            .checked_div(self.increment)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        steps.checked_mul(self.increment).map(|v| v.normalize())
    }
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self::quarter_unit()
    }
}

/// Inputs for a glass area calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlassAreaRequest {
    pub width_formula: String,
    pub height_formula: String,
    pub window_width: Decimal,
    pub window_height: Decimal,
    /// Pieces of this size on the quotation line
    pub glass_quantity: i64,
    pub input_unit: LengthUnit,
    pub output_unit: AreaUnit,
}

/// Result of a glass area calculation with all intermediate values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlassAreaResult {
    pub width_formula: String,
    pub height_formula: String,
    pub window_width: Decimal,
    pub window_height: Decimal,
    pub input_unit: LengthUnit,
    pub output_unit: AreaUnit,
    pub rounding_increment: Decimal,
    /// Raw formula outputs, in `input_unit`
    pub adjusted_width: Decimal,
    pub adjusted_height: Decimal,
    /// Manufacturable sizes, in `input_unit`
    pub rounded_width: Decimal,
    pub rounded_height: Decimal,
    /// Area of one piece, in `output_unit`
    pub area_per_piece: Decimal,
    pub glass_quantity: u32,
    pub total_area: Decimal,
}

/// Compute glass sizes and area for a quotation line.
///
/// Fails without a partial result if either formula fails, if the quantity
/// is not a positive integer, or if a dimension rounds to nothing.
pub fn calculate_glass_area_with_quantity(
    request: &GlassAreaRequest,
    policy: &RoundingPolicy,
) -> Result<GlassAreaResult, GlassError> {
    let glass_quantity = validate_glass_quantity(request.glass_quantity)
        .map_err(|message| GlassError::validation("glass_quantity", message))?;
    if request.window_width <= Decimal::ZERO {
        return Err(GlassError::validation("window_width", "Window width must be positive"));
    }
    if request.window_height <= Decimal::ZERO {
        return Err(GlassError::validation("window_height", "Window height must be positive"));
    }

    let bindings = HashMap::from([
        (WIDTH_VARIABLE.to_string(), request.window_width),
        (HEIGHT_VARIABLE.to_string(), request.window_height),
    ]);

    let adjusted_width = evaluate_dimension(&request.width_formula, &bindings, Dimension::Width)?;
    let adjusted_height = evaluate_dimension(&request.height_formula, &bindings, Dimension::Height)?;

    let rounded_width = round_dimension(adjusted_width, policy, "width")?;
    let rounded_height = round_dimension(adjusted_height, policy, "height")?;

    let area_per_piece = convert_area(rounded_width, rounded_height, request.input_unit, request.output_unit)
        .ok_or_else(|| GlassError::validation("area", "Glass area is too large to represent"))?;
    let total_area = area_per_piece
        .checked_mul(Decimal::from(glass_quantity))
        .ok_or_else(|| GlassError::validation("area", "Glass area is too large to represent"))?;

    Ok(GlassAreaResult {
        width_formula: request.width_formula.clone(),
        height_formula: request.height_formula.clone(),
        window_width: request.window_width,
        window_height: request.window_height,
        input_unit: request.input_unit,
        output_unit: request.output_unit,
        rounding_increment: policy.increment(),
        adjusted_width,
        adjusted_height,
        rounded_width,
        rounded_height,
        area_per_piece,
        glass_quantity,
        total_area,
    })
}

fn evaluate_dimension(
    expression: &str,
    bindings: &HashMap<String, Decimal>,
    dimension: Dimension,
) -> Result<Decimal, GlassError> {
    Formula::parse(expression)
        .and_then(|formula| formula.evaluate(bindings))
        .map_err(|source| GlassError::Formula { dimension, source })
}

fn round_dimension(value: Decimal, policy: &RoundingPolicy, field: &str) -> Result<Decimal, GlassError> {
    let rounded = policy
        .round(value)
        .ok_or_else(|| GlassError::validation(field, "Glass dimension is too large to represent"))?;
    if rounded <= Decimal::ZERO {
        return Err(GlassError::validation(
            field,
            format!("Computed glass {} {} is not a manufacturable size", field, value),
        ));
    }
    Ok(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormulaError;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sliding_window(quantity: i64) -> GlassAreaRequest {
        GlassAreaRequest {
            width_formula: "(W-4.75)/2".to_string(),
            height_formula: "H-5".to_string(),
            window_width: dec("48"),
            window_height: dec("60"),
            glass_quantity: quantity,
            input_unit: LengthUnit::Inch,
            output_unit: AreaUnit::SquareFoot,
        }
    }

    #[test]
    fn test_quarter_rounding() {
        let policy = RoundingPolicy::quarter_unit();
        assert_eq!(policy.round(dec("21.625")).unwrap(), dec("21.75"));
        assert_eq!(policy.round(dec("21.6")).unwrap(), dec("21.5"));
        assert_eq!(policy.round(dec("21.374")).unwrap(), dec("21.25"));
        assert_eq!(policy.round(dec("55")).unwrap(), dec("55"));
    }

    #[test]
    fn test_custom_increment() {
        let policy = RoundingPolicy::new(dec("0.125")).unwrap();
        assert_eq!(policy.round(dec("21.625")).unwrap(), dec("21.625"));
        let coarse = RoundingPolicy::new(dec("5")).unwrap();
        assert_eq!(coarse.round(dec("612")).unwrap(), dec("610"));
        assert!(RoundingPolicy::new(Decimal::ZERO).is_err());
        assert!(RoundingPolicy::new(dec("-0.25")).is_err());
    }

    #[test]
    fn test_sliding_window_two_pieces() {
        let result = calculate_glass_area_with_quantity(&sliding_window(2), &RoundingPolicy::default()).unwrap();

        assert_eq!(result.adjusted_width, dec("21.625"));
        assert_eq!(result.adjusted_height, dec("55"));
        assert_eq!(result.rounded_width, dec("21.75"));
        assert_eq!(result.rounded_height, dec("55"));
        // 21.75 × 55 / 144
        assert_eq!(result.area_per_piece.round_dp(4), dec("8.3073"));
        assert_eq!(result.total_area, result.area_per_piece * dec("2"));
        assert_eq!(result.glass_quantity, 2);
        assert_eq!(result.rounding_increment, dec("0.25"));
    }

    #[test]
    fn test_rounding_independent_of_call_order() {
        let policy = RoundingPolicy::default();
        let first = calculate_glass_area_with_quantity(&sliding_window(1), &policy).unwrap();
        let _ = calculate_glass_area_with_quantity(&sliding_window(5), &policy).unwrap();
        let again = calculate_glass_area_with_quantity(&sliding_window(1), &policy).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_quantity_must_be_positive() {
        for quantity in [0, -3] {
            let err = calculate_glass_area_with_quantity(&sliding_window(quantity), &RoundingPolicy::default())
                .unwrap_err();
            assert!(matches!(err, GlassError::Validation { ref field, .. } if field == "glass_quantity"));
        }
    }

    #[test]
    fn test_failed_height_formula_is_wrapped() {
        let mut request = sliding_window(1);
        request.height_formula = "H / (W - 48)".to_string();
        let err = calculate_glass_area_with_quantity(&request, &RoundingPolicy::default()).unwrap_err();
        match err {
            GlassError::Formula { dimension, source } => {
                assert_eq!(dimension, Dimension::Height);
                assert!(matches!(source, FormulaError::DivisionByZero { .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_failed_width_formula_is_wrapped() {
        let mut request = sliding_window(1);
        request.width_formula = "(W - 4.75".to_string();
        let err = calculate_glass_area_with_quantity(&request, &RoundingPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            GlassError::Formula {
                dimension: Dimension::Width,
                source: FormulaError::Syntax { .. }
            }
        ));
    }

    #[test]
    fn test_non_positive_dimension_rejected() {
        let mut request = sliding_window(1);
        request.width_formula = "W - 48".to_string();
        let err = calculate_glass_area_with_quantity(&request, &RoundingPolicy::default()).unwrap_err();
        assert!(matches!(err, GlassError::Validation { ref field, .. } if field == "width"));
    }

    #[test]
    fn test_metric_output() {
        let request = GlassAreaRequest {
            width_formula: "W - 50".to_string(),
            height_formula: "H - 50".to_string(),
            window_width: dec("1250"),
            window_height: dec("550"),
            glass_quantity: 3,
            input_unit: LengthUnit::Millimeter,
            output_unit: AreaUnit::SquareMeter,
        };
        let policy = RoundingPolicy::new(dec("1")).unwrap();
        let result = calculate_glass_area_with_quantity(&request, &policy).unwrap();
        assert_eq!(result.area_per_piece, dec("0.6"));
        assert_eq!(result.total_area, dec("1.8"));
    }
}
