//! Two-decimal monetary amounts.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

/// Number of fraction digits every rendered amount carries.
pub const AMOUNT_SCALE: u32 = 2;

/// A non-negative decimal amount, always rendered with exactly two fraction
/// digits (`"15.00"`).
///
/// Serialized as a string so CSV and JSON consumers see the same text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// The sentinel used when a provider template carries no amount.
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Parse a raw amount string.
    ///
    /// Thousands separators are ignored. Fails with
    /// [`LedgerError::InvalidAmount`] for anything that is not a
    /// non-negative decimal number.
    ///
    /// ```
    /// use ledger_core::amount::Amount;
    ///
    /// assert_eq!(Amount::parse("12.5").unwrap().to_string(), "12.50");
    /// assert_eq!(Amount::parse("1,204").unwrap().to_string(), "1204.00");
    /// assert!(Amount::parse("-3").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let text = raw.trim().replace(',', "");
        let invalid = || LedgerError::InvalidAmount(raw.to_string());
        if text.is_empty() {
            return Err(invalid());
        }
        let value = Decimal::from_str(&text).map_err(|_| invalid())?;
        if value < Decimal::ZERO {
            return Err(invalid());
        }
        Ok(Self::from_decimal(value))
    }

    /// Round `value` to two places. Negative zero collapses to zero.
    pub fn from_decimal(value: Decimal) -> Self {
        if value.is_zero() {
            return Self::ZERO;
        }
        let mut rounded = value.round_dp(AMOUNT_SCALE);
        rounded.rescale(AMOUNT_SCALE);
        Amount(rounded)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        value.rescale(AMOUNT_SCALE);
        write!(f, "{value}")
    }
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount::from_decimal(self.0 + rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Amount::parse(&raw).map_err(serde::de::Error::custom)
    }
}
