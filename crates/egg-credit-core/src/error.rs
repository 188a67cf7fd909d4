//! Error types for the egg credit ledger.

use crate::ids::IdError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Which precondition of a debit was not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionKind {
    /// The user has no active main package.
    NoMainPackage,
    /// The user has no balance document.
    NoBalance,
}

impl PreconditionKind {
    /// Human-readable detail returned to callers.
    #[must_use]
    pub const fn detail(self) -> &'static str {
        match self {
            Self::NoMainPackage => "User has no main package.",
            Self::NoBalance => "No token balance remaining.",
        }
    }
}

/// Errors that can occur in ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// A required document is missing.
    #[error("{}", .0.detail())]
    Precondition(PreconditionKind),

    /// The remaining balance is zero or negative.
    #[error("No token balance remaining.")]
    ExhaustedBalance {
        /// Remaining balance at the time of the check.
        remaining: i64,
    },

    /// The usage-cost provider could not be reached.
    #[error("error connecting to cost provider: {0}")]
    UpstreamUnavailable(String),

    /// The usage-cost provider answered with a non-success status.
    #[error("cost provider error (status {status})")]
    UpstreamRejected {
        /// HTTP status returned by the provider.
        status: u16,
        /// The provider's error payload, when it could be decoded.
        body: Option<serde_json::Value>,
    },

    /// The usage-cost provider's response could not be decoded.
    #[error("failed to decode cost provider response: {0}")]
    UpstreamDecode(String),

    /// The provider reported no cost for the trace.
    #[error("No cost found for traceId {trace_id}.")]
    NoCostFound {
        /// The trace that had no cost rows.
        trace_id: String,
    },

    /// The assigned package is missing from the package master data.
    #[error("package not found: {package_id}")]
    PackageNotFound {
        /// The package ID that was not found.
        package_id: String,
    },

    /// Any read or write failure against the event or balance stores.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<IdError> for LedgerError {
    fn from(err: IdError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_messages() {
        assert_eq!(
            LedgerError::Precondition(PreconditionKind::NoMainPackage).to_string(),
            "User has no main package."
        );
        assert_eq!(
            LedgerError::Precondition(PreconditionKind::NoBalance).to_string(),
            "No token balance remaining."
        );
    }

    #[test]
    fn id_errors_are_validation_errors() {
        let err: LedgerError = IdError::Empty.into();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
