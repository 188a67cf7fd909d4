//! Authentication extractors.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::state::AppState;

/// Service authentication via API key.
///
/// Used for service-to-service requests. When no `SERVICE_API_KEY` is
/// configured every request is accepted.
#[derive(Debug, Clone)]
pub struct ServiceAuth {
    /// The service name or identifier.
    pub service_name: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ServiceAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let service_name = parts
            .headers
            .get("x-service-name")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let Some(expected_key) = state.config.service_api_key.as_ref() else {
            return Ok(Self { service_name });
        };

        // Check for X-API-Key header
        let api_key = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        if api_key != expected_key {
            tracing::warn!(service = %service_name, "Rejected service API key");
            return Err(ApiError::Unauthorized);
        }

        Ok(Self { service_name })
    }
}
