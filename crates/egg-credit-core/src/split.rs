//! Deduction split policy.
//!
//! Decides how much of a single debit is taken from the main pool and how much
//! from the topup pool. Users whose main pool still holds at least
//! [`MAIN_DEDUCTION_THRESHOLD`] tokens spend subscription tokens first; below
//! that, purchased topup tokens are spent first.

/// Main pool level at or above which debits are taken from main first.
pub const MAIN_DEDUCTION_THRESHOLD: i64 = 100;

/// Amounts to deduct from each pool for one debit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Split {
    /// Tokens deducted from the main pool.
    pub main: i64,
    /// Tokens deducted from the topup pool.
    pub topup: i64,
}

impl Split {
    /// Total deducted across both pools.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.main.saturating_add(self.topup)
    }
}

/// Split a debit for the live fast path.
///
/// The preferred pool gives up to its current amount and the remainder spills
/// into the other pool without a cap, so `main + topup == amount` always. The
/// caller applies the result as an unconditional decrement; a pool may go
/// negative when a concurrent debit raced the read.
#[must_use]
pub fn split(current_main: i64, current_topup: i64, amount: i64) -> Split {
    if current_main >= MAIN_DEDUCTION_THRESHOLD {
        if amount <= current_main {
            Split {
                main: amount,
                topup: 0,
            }
        } else {
            Split {
                main: current_main,
                topup: amount.saturating_sub(current_main),
            }
        }
    } else if amount <= current_topup {
        Split {
            main: 0,
            topup: amount,
        }
    } else {
        Split {
            main: amount.saturating_sub(current_topup),
            topup: current_topup,
        }
    }
}

/// Split a debit while replaying history.
///
/// Same preference rule as [`split`], but the spill into the second pool is
/// capped at what that pool holds, so neither pool can go below zero. Expects
/// non-negative pools.
#[must_use]
pub fn split_capped(current_main: i64, current_topup: i64, amount: i64) -> Split {
    let live = split(current_main, current_topup, amount);
    if current_main >= MAIN_DEDUCTION_THRESHOLD {
        Split {
            main: live.main,
            topup: live.topup.min(current_topup.max(0)),
        }
    } else {
        Split {
            main: live.main.min(current_main.max(0)),
            topup: live.topup,
        }
    }
}
