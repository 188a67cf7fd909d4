//! Egg Credit HTTP API Service.
//!
//! This crate wires the ledger engine to its collaborators and exposes it over
//! HTTP:
//!
//! - Usage recording (fast-path debit against the balance document)
//! - Balance reads, recompute from history, and topup-total aggregation
//! - A background reconciler that periodically recomputes every balance
//!
//! # Authentication
//!
//! When `SERVICE_API_KEY` is configured, every `/api/v1` request must carry it in
//! the `x-api-key` header.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Axum handlers must be async

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod portkey;
pub mod reconcile;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ServiceConfig};
pub use error::ApiError;
pub use ledger::{DebitRequest, Ledger, LedgerSettings};
pub use portkey::{CostError, CostProvider, CostRow, PortkeyClient};
pub use routes::create_router;
pub use state::AppState;
