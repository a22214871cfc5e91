//! Common types used across the back office

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Linear measurement units used for profile lengths and glass dimensions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LengthUnit {
    #[serde(rename = "mm")]
    Millimeter,
    #[serde(rename = "cm")]
    Centimeter,
    #[serde(rename = "m")]
    Meter,
    #[serde(rename = "in")]
    Inch,
    #[serde(rename = "ft")]
    Foot,
}

impl LengthUnit {
    pub fn code(&self) -> &'static str {
        match self {
            LengthUnit::Millimeter => "mm",
            LengthUnit::Centimeter => "cm",
            LengthUnit::Meter => "m",
            LengthUnit::Inch => "in",
            LengthUnit::Foot => "ft",
        }
    }

    /// Exact length of one unit in millimetres
    pub fn millimeters(&self) -> Decimal {
        match self {
            LengthUnit::Millimeter => Decimal::ONE,
            LengthUnit::Centimeter => Decimal::TEN,
            LengthUnit::Meter => Decimal::ONE_THOUSAND,
            // 25.4 and 304.8
            LengthUnit::Inch => Decimal::new(254, 1),
            LengthUnit::Foot => Decimal::new(3048, 1),
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LengthUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimetre" => Ok(LengthUnit::Millimeter),
            "cm" | "centimeter" | "centimetre" => Ok(LengthUnit::Centimeter),
            "m" | "meter" | "metre" => Ok(LengthUnit::Meter),
            "in" | "inch" | "inches" => Ok(LengthUnit::Inch),
            "ft" | "foot" | "feet" => Ok(LengthUnit::Foot),
            other => Err(format!("Unknown length unit '{}'", other)),
        }
    }
}

/// Area units a glass quotation can be priced in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AreaUnit {
    #[serde(rename = "mm2")]
    SquareMillimeter,
    #[serde(rename = "cm2")]
    SquareCentimeter,
    #[serde(rename = "m2")]
    SquareMeter,
    #[serde(rename = "in2")]
    SquareInch,
    #[serde(rename = "ft2")]
    SquareFoot,
}

impl AreaUnit {
    pub fn code(&self) -> &'static str {
        match self {
            AreaUnit::SquareMillimeter => "mm2",
            AreaUnit::SquareCentimeter => "cm2",
            AreaUnit::SquareMeter => "m2",
            AreaUnit::SquareInch => "in2",
            AreaUnit::SquareFoot => "ft2",
        }
    }

    /// The linear unit whose square this area unit is
    pub fn linear_unit(&self) -> LengthUnit {
        match self {
            AreaUnit::SquareMillimeter => LengthUnit::Millimeter,
            AreaUnit::SquareCentimeter => LengthUnit::Centimeter,
            AreaUnit::SquareMeter => LengthUnit::Meter,
            AreaUnit::SquareInch => LengthUnit::Inch,
            AreaUnit::SquareFoot => LengthUnit::Foot,
        }
    }
}

impl fmt::Display for AreaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AreaUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mm2" | "sqmm" => Ok(AreaUnit::SquareMillimeter),
            "cm2" | "sqcm" => Ok(AreaUnit::SquareCentimeter),
            "m2" | "sqm" => Ok(AreaUnit::SquareMeter),
            "in2" | "sqin" => Ok(AreaUnit::SquareInch),
            "ft2" | "sqft" => Ok(AreaUnit::SquareFoot),
            other => Err(format!("Unknown area unit '{}'", other)),
        }
    }
}

/// Convert `width × height` measured in `from` into `to`.
///
/// The unit factor is applied once to the product rather than to each side,
/// so inches to square feet is exactly `(w × h) / 144`. Returns `None` on
/// decimal overflow.
pub fn convert_area(width: Decimal, height: Decimal, from: LengthUnit, to: AreaUnit) -> Option<Decimal> {
    let area = width.checked_mul(height)?;
    let target = to.linear_unit();
    if from == target {
        return Some(area);
    }

    let from_mm = from.millimeters();
    let to_mm = target.millimeters();
    let numerator = area.checked_mul(from_mm.checked_mul(from_mm)?)?;
    numerator.checked_div(to_mm.checked_mul(to_mm)?)
}

/// Order in which batches are drawn down
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest received batch first
    #[default]
    #[serde(alias = "FIFO")]
    Fifo,
    /// Newest received batch first
    #[serde(alias = "LIFO")]
    Lifo,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Fifo => "fifo",
            SortOrder::Lifo => "lifo",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why stock left the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionType {
    /// Cut for a fabrication order
    Production,
    Sale,
    /// Offcuts and damaged pieces
    Wastage,
    Transfer,
    Adjustment,
}

impl ConsumptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumptionType::Production => "production",
            ConsumptionType::Sale => "sale",
            ConsumptionType::Wastage => "wastage",
            ConsumptionType::Transfer => "transfer",
            ConsumptionType::Adjustment => "adjustment",
        }
    }
}

/// Decimal places kept on apportioned weights and costs
pub const APPORTION_SCALE: u32 = 10;

/// Scale `value` by `numerator / denominator`, multiplying first so the only
/// rounding happens in the final division. The result is fixed to
/// [`APPORTION_SCALE`] places (or `value`'s own scale if finer), so sums and
/// differences of apportioned amounts stay exact.
pub fn apportion(value: Decimal, numerator: u32, denominator: u32) -> Option<Decimal> {
    if denominator == 0 {
        return None;
    }
    let scale = APPORTION_SCALE.max(value.scale());
    value
        .checked_mul(Decimal::from(numerator))?
        .checked_div(Decimal::from(denominator))
        .map(|share| share.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn inches_to_square_feet_divides_by_144() {
        let area = convert_area(dec("24"), dec("36"), LengthUnit::Inch, AreaUnit::SquareFoot).unwrap();
        assert_eq!(area, dec("6"));
    }

    #[test]
    fn same_unit_is_plain_product() {
        let area = convert_area(dec("1.5"), dec("2"), LengthUnit::Meter, AreaUnit::SquareMeter).unwrap();
        assert_eq!(area, dec("3"));
    }

    #[test]
    fn millimeters_to_square_meters() {
        let area =
            convert_area(dec("1200"), dec("500"), LengthUnit::Millimeter, AreaUnit::SquareMeter).unwrap();
        assert_eq!(area, dec("0.6"));
    }

    #[test]
    fn unit_codes_parse_back() {
        for unit in [
            LengthUnit::Millimeter,
            LengthUnit::Centimeter,
            LengthUnit::Meter,
            LengthUnit::Inch,
            LengthUnit::Foot,
        ] {
            assert_eq!(unit.code().parse::<LengthUnit>().unwrap(), unit);
        }
        assert_eq!("sqft".parse::<AreaUnit>().unwrap(), AreaUnit::SquareFoot);
        assert!("furlong".parse::<LengthUnit>().is_err());
    }

    #[test]
    fn apportion_multiplies_before_dividing() {
        assert_eq!(apportion(dec("14.0"), 5, 20).unwrap(), dec("3.5"));
        assert_eq!(apportion(dec("10"), 3, 3).unwrap(), dec("10"));
        assert!(apportion(dec("1"), 1, 0).is_none());
        assert_eq!(apportion(dec("10"), 1, 3).unwrap(), dec("3.3333333333"));
    }

    #[test]
    fn sort_order_defaults_to_fifo() {
        assert_eq!(SortOrder::default(), SortOrder::Fifo);
        let parsed: SortOrder = serde_json::from_str("\"lifo\"").unwrap();
        assert_eq!(parsed, SortOrder::Lifo);
    }

    #[test]
    fn sort_order_accepts_upper_case() {
        let parsed: SortOrder = serde_json::from_str("\"FIFO\"").unwrap();
        assert_eq!(parsed, SortOrder::Fifo);
        let parsed: SortOrder = serde_json::from_str("\"LIFO\"").unwrap();
        assert_eq!(parsed, SortOrder::Lifo);
        assert_eq!(serde_json::to_string(&SortOrder::Lifo).unwrap(), "\"lifo\"");
        assert!(serde_json::from_str::<SortOrder>("\"Lifo\"").is_err());
    }
}
