//! Usage-cost provider integration.
//!
//! The ledger only needs one thing from the outside world: the metered cost of a
//! trace. [`CostProvider`] is that seam; [`PortkeyClient`] implements it against
//! the Portkey analytics API.

pub mod client;
pub mod types;

pub use client::PortkeyClient;
pub use types::{AnalyticsResponse, CostRow};

use async_trait::async_trait;
use egg_credit_core::{LedgerError, TraceId};

/// Error type for cost lookups.
#[derive(Debug, thiserror::Error)]
pub enum CostError {
    /// The provider could not be reached.
    #[error("error connecting to Portkey: {0}")]
    Unavailable(String),

    /// The provider answered with a non-success status.
    #[error("Portkey API error (status {status})")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Decoded JSON error body, when there was one.
        body: Option<serde_json::Value>,
    },

    /// The success response could not be decoded.
    #[error("failed to decode Portkey response: {0}")]
    Decode(String),
}

impl From<CostError> for LedgerError {
    fn from(err: CostError) -> Self {
        match err {
            CostError::Unavailable(msg) => Self::UpstreamUnavailable(msg),
            CostError::Rejected { status, body } => Self::UpstreamRejected { status, body },
            CostError::Decode(msg) => Self::UpstreamDecode(msg),
        }
    }
}

/// Source of metered usage cost.
#[async_trait]
pub trait CostProvider: Send + Sync {
    /// Fetch the cost rows recorded for a trace.
    ///
    /// An empty vector means the provider knows nothing about the trace.
    async fn fetch_costs(&self, trace_id: &TraceId) -> Result<Vec<CostRow>, CostError>;
}
