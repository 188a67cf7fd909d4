//! Portkey analytics API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, StatusCode};

use egg_credit_core::TraceId;

use super::types::{AnalyticsResponse, CostRow};
use super::{CostError, CostProvider};
use crate::config::{ConfigError, ServiceConfig};

/// Header carrying the Portkey API key.
const API_KEY_HEADER: &str = "x-portkey-api-key";

/// Portkey analytics API client.
#[derive(Debug, Clone)]
pub struct PortkeyClient {
    client: Client,
    url: String,
    api_key: String,
    workspace_slug: String,
    window_start: String,
}

impl PortkeyClient {
    /// Create a new Portkey client.
    ///
    /// # Arguments
    ///
    /// * `url` - Full analytics endpoint URL
    /// * `api_key` - Portkey API key
    /// * `workspace_slug` - Workspace whose traces are queried
    /// * `window_start` - Lower bound of the generation-time window (RFC 3339)
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        workspace_slug: impl Into<String>,
        window_start: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            workspace_slug: workspace_slug.into(),
            window_start: window_start.into(),
        })
    }

    /// Create a client from the service configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or key is missing or the HTTP client cannot
    /// be built.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let url = config
            .portkey_url
            .clone()
            .ok_or(ConfigError::Missing("PORTKEY_URL"))?;
        let api_key = config
            .portkey_api_key
            .clone()
            .ok_or(ConfigError::Missing("PORTKEY_API_KEY"))?;

        Self::new(
            url,
            api_key,
            config.portkey_workspace_slug.clone(),
            config.portkey_window_start.clone(),
            Duration::from_secs(config.portkey_timeout_seconds),
        )
    }

    /// Map a non-success response to a rejection, keeping its JSON body.
    async fn rejection(status: StatusCode, response: reqwest::Response) -> CostError {
        let body = response.json::<serde_json::Value>().await.ok();
        if body.is_none() {
            tracing::warn!(status = status.as_u16(), "Undecodable Portkey error body");
        }
        CostError::Rejected {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl CostProvider for PortkeyClient {
    async fn fetch_costs(&self, trace_id: &TraceId) -> Result<Vec<CostRow>, CostError> {
        let window_end = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let response = self
            .client
            .get(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[
                ("trace_id", trace_id.as_str()),
                ("workspace_slug", self.workspace_slug.as_str()),
                ("time_of_generation_min", self.window_start.as_str()),
                ("time_of_generation_max", window_end.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CostError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Self::rejection(status, response).await);
        }

        let body: AnalyticsResponse = response
            .json()
            .await
            .map_err(|e| CostError::Decode(e.to_string()))?;

        let rows = body.rows();
        tracing::debug!(trace_id = %trace_id, rows = rows.len(), "Fetched Portkey cost rows");
        Ok(rows)
    }
}
