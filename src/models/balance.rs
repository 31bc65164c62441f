//! Balance models.

use std::fmt;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Body returned by the read endpoints and the scoped deposit endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

/// Client-side copy of an account balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BalanceState {
    /// No successful read yet.
    #[default]
    Unknown,
    /// Most recently applied value.
    Known(Decimal),
}

impl BalanceState {
    /// Returns the balance if known.
    pub fn value(&self) -> Option<Decimal> {
        match self {
            BalanceState::Unknown => None,
            BalanceState::Known(balance) => Some(*balance),
        }
    }
}

impl fmt::Display for BalanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceState::Unknown => f.write_str("unknown"),
            BalanceState::Known(balance) => fmt::Display::fmt(balance, f),
        }
    }
}
