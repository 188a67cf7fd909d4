//! Storage layer for the egg credit ledger.
//!
//! The ledger reads and writes three kinds of data:
//!
//! - **Event store**: the append-only per-user event history
//! - **Reference data**: packages, package assignments and topup purchases,
//!   owned by the subscription system and only read by the ledger
//! - **Balance store**: one balance document per user, updated by the
//!   unconditional increment of the fast path and by the recompute upsert
//!
//! Two implementations are provided: [`MemoryStore`] for tests and single-node
//! use, and `RocksStore` (feature `rocksdb-backend`) for persistent storage.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use egg_credit_core::{BalanceDelta, UserId};
//! use egg_credit_store::{MemoryStore, Store};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new();
//! let user = UserId::new("user-1").unwrap();
//!
//! store
//!     .increment_balance(&user, &BalanceDelta::debit(-10, 0, 10), Utc::now())
//!     .await
//!     .unwrap();
//!
//! let balance = store.get_balance(&user).await.unwrap().unwrap();
//! assert_eq!(balance.remaining_token_balance, -10);
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;

#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use egg_credit_core::{
    Balance, BalanceDelta, LedgerEvent, MainPackageAssignment, Package, PackageId,
    RecomputedBalance, TopupPackageAssignment, TopupPurchase, UserId,
};

/// The storage trait defining all ledger database operations.
///
/// This trait abstracts the storage layer so the ledger can run against
/// `RocksDB`, memory, or a test double.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Event Store
    // =========================================================================

    /// List all events of a user in ascending timestamp order.
    ///
    /// Events with equal timestamps are ordered by event ID, which increases in
    /// creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_events(&self, user_id: &UserId) -> Result<Vec<LedgerEvent>>;

    /// Append one event to its user's history.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn append_event(&self, event: &LedgerEvent) -> Result<()>;

    // =========================================================================
    // Reference Data
    // =========================================================================

    /// Get a package by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_package(&self, package_id: &PackageId) -> Result<Option<Package>>;

    /// Get the user's active main package assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_active_main_package(&self, user_id: &UserId)
        -> Result<Option<MainPackageAssignment>>;

    /// Get the user's active topup package assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_active_topup_package(
        &self,
        user_id: &UserId,
    ) -> Result<Option<TopupPackageAssignment>>;

    /// List the user's active topup purchases.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_active_topup_purchases(&self, user_id: &UserId) -> Result<Vec<TopupPurchase>>;

    // =========================================================================
    // Balance Store
    // =========================================================================

    /// Get a user's balance document.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_balance(&self, user_id: &UserId) -> Result<Option<Balance>>;

    /// Atomically add `delta` to the balance counters and touch `updatedAt`.
    ///
    /// The increment is unconditional: no comparison against a previously read
    /// value is made. A missing document is created from zero.
    ///
    /// Dropping the returned future does not cancel a write already handed to
    /// the backend. A caller that stops waiting cannot tell whether it applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn increment_balance(
        &self,
        user_id: &UserId,
        delta: &BalanceDelta,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Overwrite the derived balance fields, creating the document if missing.
    ///
    /// Returns the document as written. `createdAt` is only set on insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn upsert_balance(
        &self,
        user_id: &UserId,
        recomputed: &RecomputedBalance,
        at: DateTime<Utc>,
    ) -> Result<Balance>;

    /// List every user that has a balance document.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_balance_users(&self) -> Result<Vec<UserId>>;
}
