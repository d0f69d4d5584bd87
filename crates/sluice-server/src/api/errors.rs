//! Error handling for the Sluice Server API
//!
//! This module contains standardized error handling for the API.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::error::ServerError;

/// General error response handler for API errors
///
/// This will convert a server error into a standardized API error response.
pub fn api_error_response(err: &ServerError) -> axum::response::Response {
    let (status_code, error_code, error_message) = match err {
        ServerError::NotFound(resource) => (
            StatusCode::NOT_FOUND,
            "ERR_NOT_FOUND".to_string(),
            format!("{} not found", resource),
        ),
        ServerError::ValidationError(msg) => (
            StatusCode::BAD_REQUEST,
            "ERR_VALIDATION_ERROR".to_string(),
            msg.clone(),
        ),
        ServerError::Conflict(msg) => (
            StatusCode::CONFLICT,
            "ERR_CONFLICT".to_string(),
            msg.clone(),
        ),
        ServerError::ProviderError(msg) => (
            StatusCode::BAD_GATEWAY,
            "ERR_PROVIDER_ERROR".to_string(),
            msg.clone(),
        ),
        ServerError::QueueError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_QUEUE_ERROR".to_string(),
            msg.clone(),
        ),
        ServerError::RuntimeError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_RUNTIME_ERROR".to_string(),
            msg.clone(),
        ),
        ServerError::ConfigError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_CONFIG_ERROR".to_string(),
            msg.clone(),
        ),
        ServerError::InternalError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_INTERNAL_SERVER_ERROR".to_string(),
            msg.clone(),
        ),
    };

    let error_response = json!({
        "error": error_message,
        "errorDetails": {
            "errorCode": error_code,
            "errorMessage": error_message,
        }
    });

    (status_code, Json(error_response)).into_response()
}
