//! Usage recording handler.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;

use egg_credit_core::{AgentId, LedgerEvent, TraceId, UserId};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::ledger::DebitRequest;
use crate::state::AppState;

/// Usage request from services.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsedRequest {
    /// User being charged.
    pub user_id: String,
    /// Trace whose metered cost is charged.
    pub trace_id: String,
    /// Agent that generated the usage (optional).
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Websearch cost in USD (optional).
    #[serde(default)]
    pub websearch_cost: Option<Decimal>,
}

impl TryFrom<TokenUsedRequest> for DebitRequest {
    type Error = ApiError;

    fn try_from(body: TokenUsedRequest) -> Result<Self, Self::Error> {
        let user_id = UserId::new(&body.user_id)
            .map_err(|e| ApiError::BadRequest(format!("Invalid userId: {e}")))?;
        let trace_id = TraceId::new(&body.trace_id)
            .map_err(|e| ApiError::BadRequest(format!("Invalid traceId: {e}")))?;
        let agent_id = body
            .agent_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(AgentId::new)
            .transpose()
            .map_err(|e| ApiError::BadRequest(format!("Invalid agentId: {e}")))?;

        Ok(Self {
            user_id,
            trace_id,
            agent_id,
            websearch_cost_usd: body.websearch_cost,
        })
    }
}

/// Debit one usage and return the recorded usage event.
pub async fn record_token_used(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    payload: Result<Json<TokenUsedRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LedgerEvent>), ApiError> {
    let Json(body) = payload?;
    let request = DebitRequest::try_from(body)?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %request.user_id,
        trace_id = %request.trace_id,
        "Processing token usage"
    );

    let event = state.ledger.debit(request).await.map_err(|e| {
        tracing::warn!(error = %e, "Token usage rejected");
        ApiError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(event)))
}
