//! Deposit amounts and their local validation.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::BankviewError;

/// Amount submitted by the "fixed deposit" key.
pub const FIXED_DEPOSIT: u32 = 10;

/// A strictly positive deposit amount.
///
/// Constructed only through [`DepositAmount::parse`] or
/// [`DepositAmount::fixed`], so a value of this type has already passed
/// validation and is safe to put in a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositAmount(Decimal);

impl DepositAmount {
    /// Parses and validates user input.
    ///
    /// # Errors
    ///
    /// Returns [`BankviewError::InvalidInput`] if the input is empty,
    /// not a number, or not strictly positive.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(BankviewError::InvalidInput(
                "deposit amount is empty".to_string(),
            ));
        }

        let amount = Decimal::from_str(input).map_err(|_| {
            BankviewError::InvalidInput(format!("deposit amount {input:?} is not a number"))
        })?;

        if amount <= Decimal::ZERO {
            return Err(BankviewError::InvalidInput(format!(
                "deposit amount must be positive, got {input}"
            )));
        }

        Ok(Self(amount.normalize()))
    }

    /// The fixed deposit of [`FIXED_DEPOSIT`].
    pub fn fixed() -> Self {
        Self(Decimal::from(FIXED_DEPOSIT))
    }

    /// Returns the amount as a decimal.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for DepositAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
