//! Health check handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Debits whose usage event could not be appended since startup.
    pub missed_event_appends: u64,
    /// Debits whose balance increment timed out since startup.
    pub unconfirmed_debits: u64,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "egg-credit".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        missed_event_appends: state.ledger.missed_appends(),
        unconfirmed_debits: state.ledger.unconfirmed_debits(),
    })
}
