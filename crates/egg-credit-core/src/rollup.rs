//! Balance fold over a user's ledger history.
//!
//! Replaying the full, timestamp-ordered history from `(0, 0)` reproduces the
//! main and topup pools. The fold is pure: the same history always yields the
//! same result, which is what makes it the authoritative correction mechanism.

use crate::event::{EventKind, LedgerEvent};
use crate::split::split_capped;

/// Main and topup pools derived from history. Both are never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rollup {
    /// Main (subscription) pool.
    pub main: i64,
    /// Topup (purchased) pool.
    pub topup: i64,
}

impl Rollup {
    /// Remaining tokens across both pools.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.main.saturating_add(self.topup)
    }

    /// Apply one event to the running state.
    ///
    /// Events of an unrecognized kind leave the state unchanged.
    pub fn apply(&mut self, event: &LedgerEvent) {
        let amount = event.magnitude();

        match &event.kind {
            EventKind::Subscribe => self.main = self.main.saturating_add(amount),
            EventKind::Topup => self.topup = self.topup.saturating_add(amount),
            EventKind::TokenUsed => {
                let split = split_capped(self.main, self.topup, amount);
                self.main -= split.main;
                self.topup -= split.topup;
            }
            EventKind::Expired => {
                if amount <= self.main {
                    self.main -= amount;
                } else {
                    let remainder = amount - self.main;
                    self.main = 0;
                    self.topup = (self.topup - remainder).max(0);
                }
            }
            EventKind::MainExpired => self.main = (self.main - amount).max(0),
            EventKind::TopupExpired => self.topup = (self.topup - amount).max(0),
            EventKind::Other(_) => {}
        }
    }
}

/// Fold an ordered event history into balances.
///
/// The caller supplies events in ascending timestamp order; the fold does not
/// sort.
pub fn rollup<'a, I>(events: I) -> Rollup
where
    I: IntoIterator<Item = &'a LedgerEvent>,
{
    events.into_iter().fold(Rollup::default(), |mut state, event| {
        state.apply(event);
        state
    })
}
