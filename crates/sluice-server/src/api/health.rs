//! Health check endpoint for the Sluice Server
//!
//! This module contains the health check handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::server::SluiceServer;

/// Health check handler
///
/// This endpoint provides basic health information about the server and
/// its container provider dependency.
pub async fn health_check(State(server): State<Arc<SluiceServer>>) -> impl IntoResponse {
    info!("Health check requested");

    let mut response = json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
        "dependencies": {},
    });

    // Check container provider
    let provider_status = match server.check_provider_health().await {
        Ok(true) => "UP",
        Ok(false) => "DEGRADED",
        Err(_) => "DOWN",
    };
    response["dependencies"]["containerProvider"] = json!({
        "status": provider_status,
    });

    // Determine overall status
    let overall_status = if provider_status == "DOWN" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (overall_status, Json(response))
}
