//! Balance handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use egg_credit_core::{Balance, UserId};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Topup total response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopupTotalResponse {
    /// The user.
    pub user_id: UserId,
    /// Tokens granted by the user's active topup purchases.
    pub total_topup_token: i64,
}

fn parse_user(raw: &str) -> Result<UserId, ApiError> {
    UserId::new(raw).map_err(|e| ApiError::BadRequest(format!("Invalid userId: {e}")))
}

/// Get a user's current balance document.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<Balance>, ApiError> {
    let user_id = parse_user(&user_id)?;

    state
        .ledger
        .balance(&user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Balance not found".into()))
}

/// Recompute a user's balance from the event history.
pub async fn recompute_balance(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<Balance>, ApiError> {
    let user_id = parse_user(&user_id)?;
    tracing::info!(service = %auth.service_name, user_id = %user_id, "Recompute requested");

    let balance = state.ledger.recompute(&user_id).await?;
    Ok(Json(balance))
}

/// Sum the grants of a user's active topup purchases.
pub async fn topup_total(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<TopupTotalResponse>, ApiError> {
    let user_id = parse_user(&user_id)?;
    let total_topup_token = state.ledger.recompute_total_topup_token(&user_id).await?;

    Ok(Json(TopupTotalResponse {
        user_id,
        total_topup_token,
    }))
}
