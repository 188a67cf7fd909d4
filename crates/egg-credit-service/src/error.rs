//! API error types and responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use egg_credit_core::{LedgerError, PreconditionKind};

/// Detail returned for internal failures whose cause is only logged.
const INTERNAL_DETAIL: &str = "An internal error occurred";

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The user may not spend tokens right now.
    #[error("forbidden: {detail}")]
    Forbidden {
        /// Machine-readable reason.
        code: &'static str,
        /// Human-readable detail.
        detail: String,
    },

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The cost provider failed; `status` is 502 or the provider's own status.
    #[error("upstream error: {detail}")]
    Upstream {
        /// Response status.
        status: StatusCode,
        /// Human-readable detail.
        detail: String,
        /// The provider's error payload, passed through unchanged.
        payload: Option<serde_json::Value>,
    },

    /// Internal server error.
    #[error("internal error: {cause}")]
    Internal {
        /// Detail safe to return to the caller.
        detail: &'static str,
        /// Logged cause.
        cause: String,
    },
}

impl ApiError {
    /// Internal error with the generic detail.
    #[must_use]
    pub fn internal(cause: impl Into<String>) -> Self {
        Self::Internal {
            detail: INTERNAL_DETAIL,
            cause: cause.into(),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, detail, error) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing or invalid API key".to_string(),
                None,
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            Self::Forbidden { code, detail } => (StatusCode::FORBIDDEN, code, detail, None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            Self::Upstream {
                status,
                detail,
                payload,
            } => (status, "upstream_error", detail, payload),
            Self::Internal { detail, cause } => {
                tracing::error!(error = %cause, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    detail.to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            detail,
            code,
            error,
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => Self::BadRequest(msg),
            LedgerError::Precondition(kind) => Self::Forbidden {
                code: match kind {
                    PreconditionKind::NoMainPackage => "no_main_package",
                    PreconditionKind::NoBalance => "no_balance",
                },
                detail: kind.detail().to_string(),
            },
            err @ LedgerError::ExhaustedBalance { .. } => Self::Forbidden {
                code: "balance_exhausted",
                detail: err.to_string(),
            },
            LedgerError::UpstreamUnavailable(msg) => Self::Upstream {
                status: StatusCode::BAD_GATEWAY,
                detail: format!("Error connecting to Portkey: {msg}"),
                payload: None,
            },
            LedgerError::UpstreamRejected { status, body } => {
                let detail = if body.is_some() {
                    format!("Portkey API error (status {status})")
                } else {
                    format!("Portkey API error (status {status}): unable to decode error response")
                };
                Self::Upstream {
                    status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                    detail,
                    payload: body,
                }
            }
            LedgerError::UpstreamDecode(msg) => Self::Internal {
                detail: "Failed to decode Portkey response",
                cause: msg,
            },
            LedgerError::NoCostFound { .. } => {
                Self::NotFound("No Portkey cost found for traceId.".into())
            }
            err @ LedgerError::PackageNotFound { .. } => Self::Internal {
                detail: "Package not found",
                cause: err.to_string(),
            },
            LedgerError::Storage(msg) => Self::internal(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        Self::BadRequest("Invalid request body".into())
    }
}
