//! Wire and domain models.
//!
//! Contains account scoping, validated deposit amounts, and the JSON
//! bodies exchanged with the balance service over HTTP and push channels.

pub mod account;
pub mod balance;
pub mod deposit;
pub mod push;

pub use account::{AccountId, Scope};
pub use balance::{BalanceResponse, BalanceState};
pub use deposit::{DepositAmount, FIXED_DEPOSIT};
pub use push::PushMessage;
