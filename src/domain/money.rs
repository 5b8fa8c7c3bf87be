use crate::error::UssdError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::ops::Add;
use std::str::FromStr;

/// A non-negative amount of money held in a ledger source.
///
/// Wraps `rust_decimal::Decimal` so that arithmetic on balances can never
/// silently produce a negative value: subtraction goes through
/// [`Balance::checked_sub`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A strictly positive amount moved by a debit, credit or conversion.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, UssdError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(UssdError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    /// Parses a caller-typed amount such as `"50"` or `"12.5"`.
    pub fn parse(input: &str) -> Option<Self> {
        Decimal::from_str(input.trim())
            .ok()
            .and_then(|value| Self::new(value).ok())
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Subtracts `amount`, or returns `None` when the result would be negative.
    pub fn checked_sub(self, amount: Amount) -> Option<Self> {
        if self.0 >= amount.0 {
            Some(Self(self.0 - amount.0))
        } else {
            None
        }
    }
}

impl Add<Amount> for Balance {
    type Output = Self;
    fn add(self, rhs: Amount) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

/// Renders `value` for a menu line, e.g. `R147.50`.
pub fn format_money(symbol: &str, value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{symbol}{rounded:.2}")
}
