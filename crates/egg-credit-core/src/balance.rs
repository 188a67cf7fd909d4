//! Balance document types.
//!
//! One balance document exists per user. Two write paths touch it:
//!
//! - the fast-path debit applies a [`BalanceDelta`] as an unconditional increment,
//! - the recompute path overwrites the derived fields with a [`RecomputedBalance`].
//!
//! Storage backends use [`Balance::apply_delta`] and [`Balance::apply_recompute`]
//! so every backend shares the same update semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::rollup::Rollup;

/// A user's live token balance.
///
/// After a recompute, `remaining == main + topup`. The fast path decrements the
/// fields directly, so under concurrent debits the pools may transiently diverge
/// from what the event history folds to until the next recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    /// The user this balance belongs to.
    pub user_id: UserId,

    /// Token capacity granted by the active packages, decremented by debits.
    pub total_token: i64,

    /// Main (subscription) pool.
    pub main_token_balance: i64,

    /// Topup (purchased) pool.
    pub topup_token_balance: i64,

    /// Tokens remaining across both pools.
    pub remaining_token_balance: i64,

    /// When the document was last written.
    pub updated_at: DateTime<Utc>,

    /// When the document was first written.
    pub created_at: DateTime<Utc>,
}

impl Balance {
    /// Create an empty balance document.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            total_token: 0,
            main_token_balance: 0,
            topup_token_balance: 0,
            remaining_token_balance: 0,
            updated_at: now,
            created_at: now,
        }
    }

    /// Check whether any tokens remain to be spent.
    #[must_use]
    pub const fn has_remaining(&self) -> bool {
        self.remaining_token_balance > 0
    }

    /// Apply an increment in place and touch `updated_at`.
    pub fn apply_delta(&mut self, delta: &BalanceDelta, at: DateTime<Utc>) {
        self.total_token = self.total_token.saturating_add(delta.total);
        self.remaining_token_balance = self.remaining_token_balance.saturating_add(delta.remaining);
        self.main_token_balance = self.main_token_balance.saturating_add(delta.main);
        self.topup_token_balance = self.topup_token_balance.saturating_add(delta.topup);
        self.updated_at = at;
    }

    /// Overwrite the derived fields from a recompute, keeping `created_at`.
    pub fn apply_recompute(&mut self, recomputed: &RecomputedBalance, at: DateTime<Utc>) {
        self.total_token = recomputed.total_token;
        self.main_token_balance = recomputed.main;
        self.topup_token_balance = recomputed.topup;
        self.remaining_token_balance = recomputed.remaining;
        self.updated_at = at;
    }

    /// Upsert semantics: update `existing` or insert a new document.
    ///
    /// `created_at` is only set when no document existed.
    #[must_use]
    pub fn upsert(
        existing: Option<Self>,
        user_id: UserId,
        recomputed: &RecomputedBalance,
        at: DateTime<Utc>,
    ) -> Self {
        let mut balance = existing.unwrap_or_else(|| Self::new(user_id, at));
        balance.apply_recompute(recomputed, at);
        balance
    }
}

/// Signed increments applied atomically by the fast-path debit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    /// Added to `total_token`.
    pub total: i64,
    /// Added to `remaining_token_balance`.
    pub remaining: i64,
    /// Added to `main_token_balance`.
    pub main: i64,
    /// Added to `topup_token_balance`.
    pub topup: i64,
}

impl BalanceDelta {
    /// Build the increment for a debit of `egg_token` (negative) split across pools.
    #[must_use]
    pub const fn debit(egg_token: i64, main_deducted: i64, topup_deducted: i64) -> Self {
        Self {
            total: egg_token,
            remaining: egg_token,
            main: -main_deducted,
            topup: -topup_deducted,
        }
    }
}

/// Fields written by the recompute path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputedBalance {
    /// Capacity: main package grant plus accumulated topup grant.
    pub total_token: i64,
    /// Main pool from the fold.
    pub main: i64,
    /// Topup pool from the fold.
    pub topup: i64,
    /// Remaining total from the fold.
    pub remaining: i64,
}

impl RecomputedBalance {
    /// Combine a fold result with the granted capacity.
    ///
    /// The fold gives what is left; the capacity is what was granted. They are
    /// different quantities and are kept in different fields.
    #[must_use]
    pub const fn new(rollup: Rollup, capacity: i64) -> Self {
        Self {
            total_token: capacity,
            main: rollup.main,
            topup: rollup.topup,
            remaining: rollup.total(),
        }
    }
}
