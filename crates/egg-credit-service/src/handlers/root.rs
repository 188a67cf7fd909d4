//! Service banner.

use axum::Json;
use serde::Serialize;

/// Banner response.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    /// Always `"success"`.
    pub status: &'static str,
    /// Service description.
    pub message: &'static str,
}

/// Root endpoint.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "success",
        message: "This is Credit Service API.",
    })
}
