//! Validation utilities for the Alufab back office

use rust_decimal::Decimal;

// ============================================================================
// Stock Validations
// ============================================================================

/// Validate a piece count for inward or consumption
pub fn validate_quantity(quantity: u32) -> Result<(), &'static str> {
    if quantity == 0 {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate the weighed total of an inward batch
pub fn validate_actual_weight(weight: Decimal) -> Result<(), &'static str> {
    if weight <= Decimal::ZERO {
        return Err("Actual weight must be greater than zero");
    }
    Ok(())
}

/// Validate the invoiced cost of an inward batch (free samples are allowed)
pub fn validate_total_cost(cost: Decimal) -> Result<(), &'static str> {
    if cost < Decimal::ZERO {
        return Err("Total cost cannot be negative");
    }
    Ok(())
}

/// Validate a profile length
pub fn validate_length(length: Decimal) -> Result<(), &'static str> {
    if length <= Decimal::ZERO {
        return Err("Length must be greater than zero");
    }
    Ok(())
}

/// Validate a material code or gauge label
pub fn validate_code(code: &str) -> Result<(), &'static str> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err("Code cannot be empty");
    }
    if trimmed.len() > 64 {
        return Err("Code must be at most 64 characters");
    }
    Ok(())
}

// ============================================================================
// Glass Validations
// ============================================================================

/// Validate the piece count on a glass line and narrow it to `u32`
pub fn validate_glass_quantity(quantity: i64) -> Result<u32, &'static str> {
    if quantity <= 0 {
        return Err("Glass quantity must be a positive whole number");
    }
    u32::try_from(quantity).map_err(|_| "Glass quantity is too large")
}

/// Validate a rounding increment for glass dimensions
pub fn validate_rounding_increment(increment: Decimal) -> Result<(), &'static str> {
    if increment <= Decimal::ZERO {
        return Err("Rounding increment must be greater than zero");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_stock_validations() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_actual_weight(Decimal::from_str("0.001").unwrap()).is_ok());
        assert!(validate_actual_weight(Decimal::ZERO).is_err());
        assert!(validate_total_cost(Decimal::ZERO).is_ok());
        assert!(validate_total_cost(Decimal::from_str("-1").unwrap()).is_err());
        assert!(validate_length(Decimal::from(12)).is_ok());
        assert!(validate_length(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_code_validation() {
        assert!(validate_code("ALU-6063-T5").is_ok());
        assert!(validate_code("   ").is_err());
        assert!(validate_code(&"X".repeat(65)).is_err());
    }

    #[test]
    fn test_glass_quantity() {
        assert_eq!(validate_glass_quantity(4), Ok(4));
        assert!(validate_glass_quantity(0).is_err());
        assert!(validate_glass_quantity(-2).is_err());
        assert!(validate_glass_quantity(i64::MAX).is_err());
    }
}
