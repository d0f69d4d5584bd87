//! API module for the Sluice Server
//!
//! This module contains the API routes and handlers for the Sluice Server.

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod errors;
pub mod health;

use crate::error::ServerError;
use crate::server::SluiceServer;
use sluice_core::{JobId, JobStatus};

/// Build the router for API endpoints
pub fn build_router(server: Arc<SluiceServer>) -> Router {
    Router::new()
        // Job management
        .route("/v1/jobs", post(handle_start_job).get(handle_list_jobs))
        .route("/v1/jobs/:job_id", get(handle_get_job))
        // External events
        .route(
            "/v1/jobs/:job_id/events/:event_name",
            post(handle_raise_event),
        )
        // Health check
        .route("/health", get(health::health_check))
        .layer(TraceLayer::new_for_http())
        // Shared state
        .with_state(server)
}

/// Request to start a job
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartJobRequest {
    video_url: String,
}

/// Handler for starting a job
async fn handle_start_job(
    State(server): State<Arc<SluiceServer>>,
    Json(request): Json<StartJobRequest>,
) -> impl IntoResponse {
    match server.start_job(request.video_url).await {
        Ok(job_id) => {
            let (status_uri, event_uri) = server.management_uris(&job_id);
            (
                StatusCode::ACCEPTED,
                [(header::LOCATION, status_uri.clone())],
                Json(json!({
                    "id": job_id.0,
                    "statusQueryGetUri": status_uri,
                    "sendEventPostUri": event_uri,
                })),
            )
                .into_response()
        }
        Err(err) => errors::api_error_response(&err),
    }
}

/// Handler for getting a job by ID
async fn handle_get_job(
    State(server): State<Arc<SluiceServer>>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match server.get_job(&JobId(job_id.clone())).await {
        Ok(Some(job)) => (
            StatusCode::OK,
            Json(json!({
                "id": job.id.0,
                "status": format!("{:?}", job.status),
                "videoUrl": job.video_url,
                "containerGroup": job.container_group,
                "publicIp": job.public_ip,
                "fqdn": job.fqdn,
                "error": job.error,
                "createdAt": job.created_at.to_rfc3339(),
                "updatedAt": job.updated_at.to_rfc3339(),
            })),
        )
            .into_response(),
        Ok(None) => errors::api_error_response(&ServerError::NotFound(format!("Job {}", job_id))),
        Err(err) => errors::api_error_response(&err),
    }
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
struct ListJobsQuery {
    status: Option<String>,
}

/// Handler for listing jobs
async fn handle_list_jobs(
    State(server): State<Arc<SluiceServer>>,
    Query(query): Query<ListJobsQuery>,
) -> impl IntoResponse {
    let status = match query.status.as_deref() {
        Some(value) => match value.parse::<JobStatus>() {
            Ok(status) => Some(status),
            Err(err) => return errors::api_error_response(&ServerError::from(err)),
        },
        None => None,
    };

    match server.list_jobs(status).await {
        Ok(jobs) => {
            let jobs: Vec<Value> = jobs
                .iter()
                .map(|job| {
                    json!({
                        "id": job.id,
                        "status": job.status,
                        "videoUrl": job.video_url,
                        "createdAt": job.created_at,
                        "updatedAt": job.updated_at,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "jobs": jobs }))).into_response()
        }
        Err(err) => errors::api_error_response(&err),
    }
}

/// Handler for delivering an external event to a job
async fn handle_raise_event(
    State(server): State<Arc<SluiceServer>>,
    Path((job_id, event_name)): Path<(String, String)>,
    payload: Option<Json<Value>>,
) -> impl IntoResponse {
    let payload = payload.map(|Json(value)| value).unwrap_or(Value::Null);

    match server
        .raise_event(&JobId(job_id.clone()), &event_name, payload)
        .await
    {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "id": job_id,
                "event": event_name,
            })),
        )
            .into_response(),
        Err(err) => errors::api_error_response(&err),
    }
}
