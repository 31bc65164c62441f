//! Push channel payloads.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::account::{AccountId, Scope};

/// Balance notification pushed by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct PushMessage {
    pub account_id: AccountId,
    pub balance: Decimal,
}

impl PushMessage {
    /// Returns `true` if the carried balance is the one shown for `scope`.
    ///
    /// A message names a single account, so it never carries the global
    /// balance.
    pub fn matches(&self, scope: &Scope) -> bool {
        match scope {
            Scope::Global => false,
            Scope::Account(id) => &self.account_id == id,
        }
    }
}
