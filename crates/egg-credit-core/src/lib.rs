//! Core types and balance rules for the egg credit ledger.
//!
//! This crate provides the pure, storage-agnostic part of the ledger:
//!
//! - **Identifiers**: `UserId`, `TraceId`, `AgentId`, `PackageId`, `SubscriptionId`, `EventId`
//! - **Events**: `LedgerEvent`, `EventKind`
//! - **Balances**: `Balance`, `BalanceDelta`, `RecomputedBalance`
//! - **Packages**: `Package`, `MainPackageAssignment`, `TopupPackageAssignment`, `TopupPurchase`
//! - **Rules**: the deduction split policy, the balance fold and the cost conversion
//!
//! # Egg Token Unit
//!
//! Balances are integer egg tokens split across two pools:
//!
//! - **main**: granted by the active subscription package
//! - **topup**: purchased separately
//!
//! Usage is metered in USD, converted to THB and divided by the package's
//! conversion ratio, always rounding the debit up to the next whole token.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod balance;
pub mod conversion;
pub mod error;
pub mod event;
pub mod ids;
pub mod lenient;
pub mod package;
pub mod rollup;
pub mod split;

pub use balance::{Balance, BalanceDelta, RecomputedBalance};
pub use conversion::{
    effective_ratio, price_usage, to_tokens, TokenDebit, UsageCost, DEFAULT_THB_PER_USD,
};
pub use error::{LedgerError, PreconditionKind, Result};
pub use event::{EventKind, LedgerEvent};
pub use ids::{AgentId, EventId, IdError, PackageId, SubscriptionId, TraceId, UserId};
pub use package::{
    accumulate_topup_grant, MainPackageAssignment, Package, TopupPackageAssignment,
    TopupPurchase, ACTIVE_STATUS,
};
pub use rollup::{rollup, Rollup};
pub use split::{split, split_capped, Split, MAIN_DEDUCTION_THRESHOLD};
