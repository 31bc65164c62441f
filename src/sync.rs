//! Latest-sequence-wins reconciliation of balance updates.
//!
//! Reads, deposits and push notifications can complete in any order.
//! Each one is tagged with a [`Seq`] when it is issued (or, for push
//! messages, when it is received) and a [`BalanceView`] only applies a
//! value whose tag is newer than the last one it applied.

use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;

use crate::models::BalanceState;

/// Monotonic tag attached to a balance update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seq(u64);

impl Seq {
    /// Raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Issues strictly increasing [`Seq`] values. Safe to share across tasks.
#[derive(Debug, Default)]
pub struct Sequencer {
    last: AtomicU64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a tag greater than every tag returned before.
    pub fn next(&self) -> Seq {
        Seq(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Displayed balance plus the tag of the update that produced it.
#[derive(Debug, Clone, Default)]
pub struct BalanceView {
    state: BalanceState,
    applied: Option<Seq>,
}

impl BalanceView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balance state.
    pub fn state(&self) -> BalanceState {
        self.state
    }

    /// Tag of the last applied update.
    pub fn applied(&self) -> Option<Seq> {
        self.applied
    }

    /// Applies `balance` unless a newer update was already applied.
    ///
    /// Returns `true` if the displayed value was replaced.
    pub fn apply(&mut self, seq: Seq, balance: Decimal) -> bool {
        if self.applied.is_some_and(|last| seq <= last) {
            return false;
        }
        self.applied = Some(seq);
        self.state = BalanceState::Known(balance);
        true
    }
}
