//! The ledger engine.
//!
//! [`Ledger`] owns the two write paths into a user's balance document:
//!
//! - [`Ledger::recompute`] replays the event history and overwrites the
//!   balance. It is the authoritative path.
//! - [`Ledger::debit`] prices one usage and applies it as an unconditional
//!   increment without replaying history. It is the live path.
//!
//! The store and cost provider are injected at construction. Every store call
//! is bounded by [`LedgerSettings::store_timeout`].

mod debit;
mod recompute;

pub use debit::DebitRequest;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use egg_credit_core::{Balance, LedgerError, Result, UserId, DEFAULT_THB_PER_USD};
use egg_credit_store::{Store, StoreError};

use crate::config::ServiceConfig;
use crate::portkey::CostProvider;

/// Tunables of the ledger engine.
#[derive(Debug, Clone, Copy)]
pub struct LedgerSettings {
    /// THB per USD exchange rate.
    pub thb_per_usd: Decimal,
    /// Bound on each store call.
    pub store_timeout: Duration,
    /// Bound on the detached usage-event append.
    pub append_timeout: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            thb_per_usd: Decimal::from(DEFAULT_THB_PER_USD),
            store_timeout: Duration::from_secs(5),
            append_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&ServiceConfig> for LedgerSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            thb_per_usd: config.thb_per_usd,
            store_timeout: config.store_timeout(),
            append_timeout: config.event_append_timeout(),
        }
    }
}

/// Balance engine over an injected store and cost provider.
pub struct Ledger {
    store: Arc<dyn Store>,
    costs: Arc<dyn CostProvider>,
    settings: LedgerSettings,
    missed_appends: Arc<AtomicU64>,
    unconfirmed_debits: AtomicU64,
}

impl Ledger {
    /// Create a ledger.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        costs: Arc<dyn CostProvider>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            store,
            costs,
            settings,
            missed_appends: Arc::new(AtomicU64::new(0)),
            unconfirmed_debits: AtomicU64::new(0),
        }
    }

    /// Number of debits whose usage event could not be appended.
    ///
    /// Each of these left the balance ahead of the event history until the
    /// event is backfilled.
    #[must_use]
    pub fn missed_appends(&self) -> u64 {
        self.missed_appends.load(Ordering::Relaxed)
    }

    /// Number of debits whose balance increment timed out.
    ///
    /// The increment may still have been applied with no usage event behind it.
    /// The next recompute of the user settles the balance from history.
    #[must_use]
    pub fn unconfirmed_debits(&self) -> u64 {
        self.unconfirmed_debits.load(Ordering::Relaxed)
    }

    /// Read a user's balance document.
    pub async fn balance(&self, user_id: &UserId) -> Result<Option<Balance>> {
        self.bounded("get_balance", self.store.get_balance(user_id))
            .await
    }

    /// List every user with a balance document.
    pub async fn balance_users(&self) -> Result<Vec<UserId>> {
        self.bounded("list_balance_users", self.store.list_balance_users())
            .await
    }

    /// Run a store call under the store timeout.
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(result) => result.map_err(LedgerError::from),
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.settings.store_timeout, "Store call timed out");
                Err(LedgerError::Storage(format!("{operation} timed out")))
            }
        }
    }
}
