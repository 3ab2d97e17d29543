use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of fractional digits kept for every monetary value.
pub const SCALE: u32 = 2;

/// Largest single amount accepted, in whole units. Keeps every sum the
/// aggregator forms well inside `Decimal`'s range.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Rounds to two places, midpoint away from zero, and pins the scale so the
/// value always renders with exactly two fractional digits.
pub fn to_cents(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(SCALE);
    rounded
}

/// A strictly positive sum of money with two-digit precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// parse reads user input such as `"12"`, `"12.5"` or `" 1200.00 "`
    pub fn parse(input: &str) -> Result<Amount, ValidationError> {
        let trimmed = input.trim();
        let value = Decimal::from_str(trimmed)
            .map_err(|_| ValidationError::InvalidAmount(input.to_string()))?;
        Amount::try_from(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = ValidationError;
    fn try_from(value: Decimal) -> Result<Amount, ValidationError> {
        let value = to_cents(value);
        if value <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount);
        }
        if value > Decimal::from(MAX_AMOUNT) {
            return Err(ValidationError::AmountTooLarge(value));
        }
        Ok(Amount(value))
    }
}

impl TryFrom<f64> for Amount {
    type Error = ValidationError;
    fn try_from(value: f64) -> Result<Amount, ValidationError> {
        // from_f64 yields None for NaN and the infinities
        let decimal = Decimal::from_f64(value)
            .ok_or_else(|| ValidationError::InvalidAmount(value.to_string()))?;
        Amount::try_from(decimal)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Decimal {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_amount() -> Result<()> {
        assert_eq!(Amount::parse("12")?.value(), dec!(12.00));
        assert_eq!(Amount::parse(" 12.5 ")?.to_string(), "12.50");
        assert_eq!(Amount::parse("0.015")?.value(), dec!(0.02));
        Ok(())
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(
            Amount::parse("twelve"),
            Err(ValidationError::InvalidAmount("twelve".to_string()))
        );
        assert!(matches!(
            Amount::parse("NaN"),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::parse(""),
            Err(ValidationError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_positive() {
        assert_eq!(Amount::parse("0"), Err(ValidationError::NonPositiveAmount));
        assert_eq!(Amount::parse("-4.20"), Err(ValidationError::NonPositiveAmount));
        // rounds to zero
        assert_eq!(Amount::parse("0.004"), Err(ValidationError::NonPositiveAmount));
    }

    #[test]
    fn test_parse_rejects_too_large() -> Result<()> {
        assert_eq!(Amount::parse("1000000000000")?.to_string(), "1000000000000.00");
        assert!(matches!(
            Amount::parse("1000000000000.01"),
            Err(ValidationError::AmountTooLarge(_))
        ));
        assert!(matches!(
            Amount::parse("50000000000000000000000000000"),
            Err(ValidationError::AmountTooLarge(_))
        ));
        assert!(serde_json::from_str::<Amount>("1e20").is_err());
        Ok(())
    }

    #[test]
    fn test_amount_from_float() -> Result<()> {
        assert_eq!(Amount::try_from(19.99_f64)?.value(), dec!(19.99));
        assert!(matches!(
            Amount::try_from(f64::INFINITY),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::try_from(f64::NAN),
            Err(ValidationError::InvalidAmount(_))
        ));
        Ok(())
    }

    #[test]
    fn test_to_cents_pins_scale() {
        assert_eq!(to_cents(dec!(1200)).to_string(), "1200.00");
        assert_eq!(to_cents(dec!(-200)).to_string(), "-200.00");
        assert_eq!(to_cents(dec!(2.345)).to_string(), "2.35");
    }

    #[test]
    fn test_deserialize_from_number_and_string() -> Result<()> {
        let from_number: Amount = serde_json::from_str("1200.5")?;
        let from_string: Amount = serde_json::from_str("\"1200.50\"")?;
        assert_eq!(from_number, from_string);
        assert!(serde_json::from_str::<Amount>("0").is_err());
        Ok(())
    }
}
