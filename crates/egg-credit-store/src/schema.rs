//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Ledger events, keyed by `user_id || 0x00 || timestamp || event_id`.
    pub const EVENTS: &str = "events";

    /// Balance documents, keyed by `user_id`. Written through the balance
    /// merge operator.
    pub const BALANCES: &str = "balances";

    /// Package master data, keyed by `package_id`.
    pub const PACKAGES: &str = "packages";

    /// Main package assignments, keyed by `user_id || 0x00 || subscription_id`.
    pub const MAIN_ASSIGNMENTS: &str = "main_assignments";

    /// Topup package assignments, keyed by `user_id`.
    pub const TOPUP_ASSIGNMENTS: &str = "topup_assignments";

    /// Topup purchases, keyed by `user_id || 0x00 || topup_id`.
    pub const TOPUP_PURCHASES: &str = "topup_purchases";
}

/// Name under which the balance merge operator is registered.
pub const BALANCE_MERGE_OPERATOR: &str = "egg_balance_increment";

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::EVENTS,
        cf::BALANCES,
        cf::PACKAGES,
        cf::MAIN_ASSIGNMENTS,
        cf::TOPUP_ASSIGNMENTS,
        cf::TOPUP_PURCHASES,
    ]
}
