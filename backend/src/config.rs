//! Configuration management for the Alufab back office
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with ALUFAB__ prefix

use std::str::FromStr;

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{AreaUnit, LengthUnit, RoundingPolicy, SortOrder};

use crate::error::{AppError, AppResult};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Stock ledger configuration
    pub ledger: LedgerConfig,

    /// Glass calculator configuration
    pub glass: GlassConfig,

    /// Log output configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Order used when a consume request does not name one
    pub default_sort_order: SortOrder,

    /// Stock level at or below which a report flags the material; 0 disables
    pub reorder_level: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GlassConfig {
    /// Increment glass sizes are rounded to, in the input unit
    pub rounding_increment: String,

    pub default_input_unit: LengthUnit,

    pub default_output_unit: AreaUnit,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when RUST_LOG is unset
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("ALUFAB_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("ledger.default_sort_order", "fifo")?
            .set_default("ledger.reorder_level", 0)?
            .set_default("glass.rounding_increment", "0.25")?
            .set_default("glass.default_input_unit", "in")?
            .set_default("glass.default_output_unit", "ft2")?
            .set_default("logging.filter", "alufab_backend=info,alufab_ledger=info")?
            .set_default("logging.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (ALUFAB__ prefix)
            .add_source(
                Environment::with_prefix("ALUFAB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl GlassConfig {
    /// Rounding policy built from the configured increment
    pub fn rounding_policy(&self) -> AppResult<RoundingPolicy> {
        let increment = Decimal::from_str(self.rounding_increment.trim()).map_err(|_| {
            AppError::Configuration(format!(
                "glass.rounding_increment '{}' is not a number",
                self.rounding_increment
            ))
        })?;
        RoundingPolicy::new(increment)
            .map_err(|e| AppError::Configuration(format!("glass.rounding_increment: {}", e)))
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_sort_order: SortOrder::Fifo,
            reorder_level: 0,
        }
    }
}

impl Default for GlassConfig {
    fn default() -> Self {
        Self {
            rounding_increment: "0.25".to_string(),
            default_input_unit: LengthUnit::Inch,
            default_output_unit: AreaUnit::SquareFoot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rounding_policy() {
        let policy = GlassConfig::default().rounding_policy().unwrap();
        assert_eq!(policy, RoundingPolicy::quarter_unit());
    }

    #[test]
    fn test_bad_increment_is_configuration_error() {
        let glass = GlassConfig {
            rounding_increment: "quarter".to_string(),
            ..GlassConfig::default()
        };
        assert!(matches!(glass.rounding_policy(), Err(AppError::Configuration(_))));

        let glass = GlassConfig {
            rounding_increment: "-1".to_string(),
            ..GlassConfig::default()
        };
        assert!(matches!(glass.rounding_policy(), Err(AppError::Configuration(_))));
    }
}
