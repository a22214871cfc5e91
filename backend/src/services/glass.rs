//! Glass cutting calculator service

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    calculate_glass_area_with_quantity, validate_formula, AreaUnit, Dimension, GlassAreaRequest,
    GlassAreaResult, LengthUnit, RoundingPolicy, HEIGHT_VARIABLE, WIDTH_VARIABLE,
};
use validator::Validate;

use crate::config::GlassConfig;
use crate::error::{AppError, AppResult};

/// Input for a glass area calculation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GlassAreaInput {
    #[validate(length(max = 500, message = "Width formula cannot exceed 500 characters"))]
    pub width_formula: String,
    #[validate(length(max = 500, message = "Height formula cannot exceed 500 characters"))]
    pub height_formula: String,
    pub window_width: Decimal,
    pub window_height: Decimal,
    pub glass_quantity: i64,
    pub input_unit: Option<LengthUnit>,
    pub output_unit: Option<AreaUnit>,
    /// Overrides the configured increment for this calculation
    pub rounding_increment: Option<Decimal>,
}

/// Result of checking a stored formula
#[derive(Debug, Clone, Serialize)]
pub struct FormulaCheck {
    pub expression: String,
    pub variables: BTreeSet<String>,
}

/// Glass calculator with the configured rounding and units
#[derive(Debug, Clone)]
pub struct GlassService {
    policy: RoundingPolicy,
    default_input_unit: LengthUnit,
    default_output_unit: AreaUnit,
}

impl GlassService {
    pub fn new(config: &GlassConfig) -> AppResult<Self> {
        Ok(Self {
            policy: config.rounding_policy()?,
            default_input_unit: config.default_input_unit,
            default_output_unit: config.default_output_unit,
        })
    }

    pub fn rounding_policy(&self) -> RoundingPolicy {
        self.policy
    }

    /// Evaluate both formulas and compute per-piece and total area
    pub fn calculate(&self, input: GlassAreaInput) -> AppResult<GlassAreaResult> {
        input.validate()?;

        let policy = match input.rounding_increment {
            Some(increment) => RoundingPolicy::new(increment)?,
            None => self.policy,
        };
        let request = GlassAreaRequest {
            width_formula: input.width_formula,
            height_formula: input.height_formula,
            window_width: input.window_width,
            window_height: input.window_height,
            glass_quantity: input.glass_quantity,
            input_unit: input.input_unit.unwrap_or(self.default_input_unit),
            output_unit: input.output_unit.unwrap_or(self.default_output_unit),
        };

        let result = calculate_glass_area_with_quantity(&request, &policy).map_err(AppError::from)?;
        tracing::debug!(
            width = %result.rounded_width,
            height = %result.rounded_height,
            quantity = result.glass_quantity,
            total_area = %result.total_area,
            unit = %result.output_unit,
            "Glass area calculated"
        );
        Ok(result)
    }

    /// Parse-only check of a formula about to be stored on a template
    pub fn check_formula(&self, dimension: Dimension, expression: &str) -> AppResult<FormulaCheck> {
        let formula = validate_formula(expression, &[WIDTH_VARIABLE, HEIGHT_VARIABLE])
            .map_err(|source| AppError::GlassFormula { dimension, source })?;
        Ok(FormulaCheck {
            expression: formula.source().to_string(),
            variables: formula.variables(),
        })
    }
}
