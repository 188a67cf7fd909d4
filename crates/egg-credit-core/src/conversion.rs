//! Conversion of metered USD cost into egg-token debits.
//!
//! `tokens = ceil(cost_usd * thb_per_usd / conversion_ratio)`, negated because a
//! debit is stored as a negative amount. Decimal arithmetic keeps cent amounts
//! exact before the ceiling is taken.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Default THB per USD exchange rate.
pub const DEFAULT_THB_PER_USD: i64 = 35;

/// Conversion ratio to use when a package's ratio is absent or not positive.
#[must_use]
pub fn effective_ratio(ratio: Option<Decimal>) -> Decimal {
    match ratio {
        Some(r) if r > Decimal::ZERO => r,
        _ => Decimal::ONE,
    }
}

/// Convert a USD cost into a (negative) token debit, rounding the magnitude up.
///
/// `ratio` is the resolved ratio from [`effective_ratio`].
#[must_use]
pub fn to_tokens(cost_usd: Decimal, ratio: Decimal, thb_per_usd: Decimal) -> i64 {
    let tokens = cost_usd
        .saturating_mul(thb_per_usd)
        .checked_div(ratio)
        .unwrap_or(Decimal::MAX)
        .ceil();
    tokens.to_i64().map_or(i64::MIN, |t| -t)
}

/// Metered cost of one usage, in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCost {
    /// Chat (model) cost.
    pub chat_usd: Decimal,
    /// Websearch cost reported by the caller.
    pub websearch_usd: Decimal,
}

impl UsageCost {
    /// Create a usage cost.
    #[must_use]
    pub const fn new(chat_usd: Decimal, websearch_usd: Decimal) -> Self {
        Self {
            chat_usd,
            websearch_usd,
        }
    }

    /// Build a usage cost from a chat cost in cents.
    #[must_use]
    pub fn from_chat_cents(chat_cents: Decimal, websearch_usd: Decimal) -> Self {
        Self::new(chat_cents / Decimal::ONE_HUNDRED, websearch_usd)
    }

    /// Combined cost.
    #[must_use]
    pub fn total_usd(&self) -> Decimal {
        self.chat_usd + self.websearch_usd
    }
}

/// Token debits for one usage. All amounts are zero or negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenDebit {
    /// Debit for the combined cost. This is the amount applied to the balance.
    pub egg_token: i64,
    /// Debit for the chat cost alone.
    pub chat_token: i64,
    /// Debit for the websearch cost alone, zero when there was none.
    pub websearch_token: i64,
}

impl TokenDebit {
    /// Magnitude of the combined debit.
    #[must_use]
    pub const fn magnitude(&self) -> i64 {
        self.egg_token.saturating_abs()
    }
}

/// Price a usage in tokens.
///
/// Each figure is rounded up on its own, so `chat_token + websearch_token` can
/// differ from `egg_token` by one. `egg_token` is the authoritative debit.
#[must_use]
pub fn price_usage(cost: &UsageCost, ratio: Decimal, thb_per_usd: Decimal) -> TokenDebit {
    let websearch_token = if cost.websearch_usd > Decimal::ZERO {
        to_tokens(cost.websearch_usd, ratio, thb_per_usd)
    } else {
        0
    };

    TokenDebit {
        egg_token: to_tokens(cost.total_usd(), ratio, thb_per_usd),
        chat_token: to_tokens(cost.chat_usd, ratio, thb_per_usd),
        websearch_token,
    }
}
