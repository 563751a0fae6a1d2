//! Type-safe unit price using decimal arithmetic.
//!
//! Prices travel as plain JSON numbers (`"price": 19.99`) because that is
//! the shape of the persisted cart blob, but are held as [`Decimal`] so that
//! subtotals do not accumulate floating-point error.
//!
//! A JSON number is read back as an `f64`, which holds any decimal of up to
//! 15 significant digits exactly. A `Price` is therefore limited to 15
//! significant digits, so that writing it out and reading it back always
//! yields the same value.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
    /// The amount has more significant digits than a JSON number keeps.
    #[error("price {0} has more than {max} significant digits", max = Price::MAX_SIGNIFICANT_DIGITS)]
    TooPrecise(Decimal),
}

/// A non-negative unit price of at most 15 significant digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Significant digits an `f64` round-trips exactly.
    pub const MAX_SIGNIFICANT_DIGITS: u32 = 15;

    /// Create a new price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `amount` is below zero, or
    /// [`PriceError::TooPrecise`] if it has more than
    /// [`Price::MAX_SIGNIFICANT_DIGITS`] significant digits.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        if significant_digits(amount) > Self::MAX_SIGNIFICANT_DIGITS {
            return Err(PriceError::TooPrecise(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from an amount in cents (e.g., `1999` is `19.99`).
    ///
    /// # Errors
    ///
    /// Same as [`Price::new`].
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, 2))
    }

    /// Get the underlying amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply by a line quantity, saturating at [`Decimal::MAX`].
    ///
    /// The result is a plain amount: a line total may exceed the precision
    /// a unit price is held to.
    #[must_use]
    pub fn times(self, quantity: u32) -> Decimal {
        self.0.saturating_mul(Decimal::from(quantity))
    }

    /// The nearest price to a number read from JSON.
    fn from_json_number(amount: Decimal) -> Result<Self, PriceError> {
        let rounded = amount
            .round_sf(Self::MAX_SIGNIFICANT_DIGITS)
            .unwrap_or(amount);
        Self::new(rounded)
    }
}

/// Number of significant digits, ignoring trailing zeros.
fn significant_digits(amount: Decimal) -> u32 {
    let mut mantissa = amount.normalize().mantissa().unsigned_abs();
    if mantissa == 0 {
        return 0;
    }
    while mantissa % 10 == 0 {
        mantissa /= 10;
    }
    mantissa.ilog10() + 1
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Parsing the decimal text gives the nearest f64, which is exact
        // within MAX_SIGNIFICANT_DIGITS.
        let number = f64::from_str(&self.0.normalize().to_string())
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_f64(number)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PriceVisitor)
    }
}

struct PriceVisitor;

impl PriceVisitor {
    fn finish<E: de::Error>(amount: Result<Decimal, rust_decimal::Error>) -> Result<Price, E> {
        let amount = amount.map_err(E::custom)?;
        Price::from_json_number(amount).map_err(E::custom)
    }
}

impl Visitor<'_> for PriceVisitor {
    type Value = Price;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative number")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
        Self::finish(Ok(Decimal::from(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
        Self::finish(Ok(Decimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
        // f64 Display is the shortest text that reads back as `v`.
        Self::finish(Decimal::from_str(&v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
        Self::finish(Decimal::from_str(v))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn roundtrip(price: Price) -> Price {
        serde_json::from_str(&serde_json::to_string(&price).unwrap()).unwrap()
    }

    #[test]
    fn test_new_rejects_negative() {
        assert!(matches!(
            Price::new(Decimal::new(-1, 0)),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_zero_is_valid() {
        assert_eq!(Price::new(Decimal::ZERO).unwrap(), Price::ZERO);
    }

    #[test]
    fn test_from_cents() {
        let price = Price::from_cents(1999).unwrap();
        assert_eq!(price.amount(), Decimal::new(1999, 2));
        assert_eq!(price.to_string(), "19.99");
    }

    #[test]
    fn test_new_rejects_more_than_fifteen_digits() {
        assert!(matches!(
            Price::new(dec("12345678901234.5678")),
            Err(PriceError::TooPrecise(_))
        ));
        assert!(matches!(
            Price::new(dec("0.3333333333333333333")),
            Err(PriceError::TooPrecise(_))
        ));
        assert!(Price::new(dec("12345678901234.5")).is_ok());
        assert!(Price::new(dec("100000000000000000000")).is_ok());
    }

    #[test]
    fn test_serializes_as_number() {
        let price = Price::from_cents(1050).unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "10.5");
    }

    #[test]
    fn test_roundtrip_is_exact_at_full_precision() {
        for raw in [
            "19.99",
            "0.1",
            "1234567.891",
            "12345678901234.5",
            "0.333333333333333",
            "999999999999999",
            "0.000000000000001",
        ] {
            let price = Price::new(dec(raw)).unwrap();
            assert_eq!(roundtrip(price), price, "{raw}");
        }
    }

    #[test]
    fn test_deserializes_integer_and_float() {
        let whole: Price = serde_json::from_str("10").unwrap();
        assert_eq!(whole.amount(), Decimal::from(10));

        let fractional: Price = serde_json::from_str("19.99").unwrap();
        assert_eq!(fractional, Price::from_cents(1999).unwrap());
    }

    #[test]
    fn test_deserialize_rounds_float_noise() {
        let price: Price = serde_json::from_str("0.30000000000000004").unwrap();
        assert_eq!(price.amount(), dec("0.3"));
        assert_eq!(roundtrip(price), price);
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        let result: Result<Price, _> = serde_json::from_str("-3");
        assert!(result.is_err());
    }

    #[test]
    fn test_times() {
        let price = Price::from_cents(250).unwrap();
        assert_eq!(price.times(3), Decimal::new(750, 2));
    }
}
