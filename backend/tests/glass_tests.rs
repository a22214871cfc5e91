//! Glass calculator tests
//!
//! Tests for the glass cutting formula service including:
//! - Formula evaluation against window sizes
//! - Rounding to the configured increment
//! - Per-piece and total area in the requested unit
//! - Error reporting for failing formulas

use std::str::FromStr;

use alufab_backend::config::GlassConfig;
use alufab_backend::error::AppError;
use alufab_backend::services::{GlassAreaInput, GlassService};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{AreaUnit, Dimension, LengthUnit};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn service() -> GlassService {
    GlassService::new(&GlassConfig::default()).unwrap()
}

fn sliding_window(glass_quantity: i64) -> GlassAreaInput {
    GlassAreaInput {
        width_formula: "(W - 4.75) / 2".to_string(),
        height_formula: "H - 5".to_string(),
        window_width: dec("48"),
        window_height: dec("60"),
        glass_quantity,
        input_unit: Some(LengthUnit::Inch),
        output_unit: Some(AreaUnit::SquareInch),
        rounding_increment: None,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test the two-shutter sliding window sizes
    #[test]
    fn test_sliding_window_sizes() {
        let result = service().calculate(sliding_window(2)).unwrap();

        assert_eq!(result.adjusted_width, dec("21.625"));
        assert_eq!(result.adjusted_height, dec("55"));
        assert_eq!(result.rounded_width, dec("21.75"));
        assert_eq!(result.rounded_height, dec("55"));
    }

    /// Test area per piece and total area
    #[test]
    fn test_area_totals() {
        let result = service().calculate(sliding_window(2)).unwrap();

        assert_eq!(result.area_per_piece, dec("1196.25"));
        assert_eq!(result.total_area, dec("2392.5"));
        assert_eq!(result.glass_quantity, 2);
    }

    /// Test square feet output applies the conversion once
    #[test]
    fn test_square_feet_output() {
        let mut input = sliding_window(2);
        input.output_unit = Some(AreaUnit::SquareFoot);
        let result = service().calculate(input).unwrap();

        assert_eq!(result.area_per_piece.round_dp(4), dec("8.3073"));
        assert_eq!(result.total_area.round_dp(4), dec("16.6146"));
    }

    /// Test millimetre windows priced per square metre
    #[test]
    fn test_metric_window() {
        let input = GlassAreaInput {
            width_formula: "W - 100".to_string(),
            height_formula: "H - 120".to_string(),
            window_width: dec("1300"),
            window_height: dec("1620"),
            glass_quantity: 4,
            input_unit: Some(LengthUnit::Millimeter),
            output_unit: Some(AreaUnit::SquareMeter),
            rounding_increment: Some(dec("5")),
        };
        let result = service().calculate(input).unwrap();

        assert_eq!(result.rounded_width, dec("1200"));
        assert_eq!(result.rounded_height, dec("1500"));
        assert_eq!(result.area_per_piece, dec("1.8"));
        assert_eq!(result.total_area, dec("7.2"));
        assert_eq!(result.rounding_increment, dec("5"));
    }

    /// Test quantity must be a positive integer
    #[test]
    fn test_glass_quantity_validation() {
        for quantity in [0, -3] {
            let err = service().calculate(sliding_window(quantity)).unwrap_err();
            assert!(matches!(err, AppError::Validation { ref field, .. } if field == "glass_quantity"));
        }
    }

    /// Test division by zero names the failing dimension and formula
    #[test]
    fn test_division_by_zero_reported() {
        let mut input = sliding_window(1);
        input.height_formula = "H / (W - 48)".to_string();
        let err = service().calculate(input).unwrap_err();

        assert_eq!(err.code(), "FORMULA_DIVISION_BY_ZERO");
        let response = err.to_response();
        assert_eq!(response.error.field.as_deref(), Some("height_formula"));
        assert_eq!(response.error.expression.as_deref(), Some("H / (W - 48)"));
    }

    /// Test unknown variables are rejected
    #[test]
    fn test_unknown_variable_reported() {
        let mut input = sliding_window(1);
        input.width_formula = "W - D".to_string();
        let err = service().calculate(input).unwrap_err();

        match err {
            AppError::GlassFormula { dimension, .. } => assert_eq!(dimension, Dimension::Width),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    /// Test syntax errors are rejected
    #[test]
    fn test_syntax_errors() {
        for formula in ["(W - 4.75", "", "W +* 2", "W $ 2"] {
            let mut input = sliding_window(1);
            input.width_formula = formula.to_string();
            let err = service().calculate(input).unwrap_err();
            assert_eq!(err.code(), "FORMULA_SYNTAX_ERROR", "formula {:?}", formula);
        }
    }

    /// Test template formula check
    #[test]
    fn test_check_formula() {
        let check = service().check_formula(Dimension::Height, "H - 5").unwrap();
        assert_eq!(check.variables.len(), 1);

        let err = service().check_formula(Dimension::Width, "W ÷ 2 × (H").unwrap_err();
        assert_eq!(err.code(), "FORMULA_SYNTAX_ERROR");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        /// Rounded sizes are always multiples of the increment
        #[test]
        fn prop_rounded_to_increment(
            width in 60i64..4000i64,
            height in 60i64..4000i64,
        ) {
            let input = GlassAreaInput {
                width_formula: "(W - 4.75) / 2".to_string(),
                height_formula: "H - 5".to_string(),
                window_width: Decimal::new(width, 1),
                window_height: Decimal::new(height, 1),
                glass_quantity: 1,
                input_unit: Some(LengthUnit::Inch),
                output_unit: Some(AreaUnit::SquareInch),
                rounding_increment: None,
            };
            let result = service().calculate(input).unwrap();
            let quarter = dec("0.25");
            prop_assert!((result.rounded_width % quarter).is_zero());
            prop_assert!((result.rounded_height % quarter).is_zero());
            prop_assert!((result.rounded_width - result.adjusted_width).abs() <= dec("0.125"));
        }

        /// Total area is the per-piece area times the quantity
        #[test]
        fn prop_total_is_per_piece_times_quantity(quantity in 1i64..500i64) {
            let result = service().calculate(sliding_window(quantity)).unwrap();
            prop_assert_eq!(result.total_area, result.area_per_piece * Decimal::from(quantity));
        }
    }
}
