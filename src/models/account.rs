//! Account identifiers and the scope a view operates in.

use std::fmt;

use serde::Deserialize;

use crate::BankviewError;
use crate::models::deposit::DepositAmount;

/// Opaque account identifier taken from the route.
///
/// The value is interpolated into URL paths, so characters that would
/// change the path structure are rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Parses a user-supplied account identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BankviewError::InvalidInput`] if the identifier is empty
    /// or contains whitespace, control characters, or any of `/ ? # %`.
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(BankviewError::InvalidInput(
                "account id is empty".to_string(),
            ));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '?' | '#' | '%'))
        {
            return Err(BankviewError::InvalidInput(format!(
                "account id {raw:?} contains {bad:?}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = BankviewError;

    fn try_from(raw: String) -> crate::Result<Self> {
        Self::parse(&raw)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which set of endpoints a view talks to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The unscoped endpoints (`/balance`, `/deposit/{amount}`).
    Global,
    /// Endpoints under `/account/{id}`.
    Account(AccountId),
}

impl Scope {
    /// Path of the read endpoint.
    pub fn balance_path(&self) -> String {
        match self {
            Scope::Global => "/balance".to_string(),
            Scope::Account(id) => format!("/account/{id}/balance"),
        }
    }

    /// Path of the write endpoint for the given amount.
    pub fn deposit_path(&self, amount: &DepositAmount) -> String {
        match self {
            Scope::Global => format!("/deposit/{amount}"),
            Scope::Account(id) => format!("/account/{id}/deposit/{amount}"),
        }
    }

    /// Returns the account identifier, if scoped.
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            Scope::Global => None,
            Scope::Account(id) => Some(id),
        }
    }

    /// Display title for tabs and headings.
    pub fn title(&self) -> String {
        match self {
            Scope::Global => "Balance".to_string(),
            Scope::Account(id) => format!("Account {id}"),
        }
    }
}
