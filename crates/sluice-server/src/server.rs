//! Main Sluice Server implementation
//!
//! This module contains the SluiceServer implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::net::TcpListener;
use tracing::info;

use sluice_core::{
    ContainerProvider, Job, JobExecutionService, JobId, JobRequest, JobStatus, JobSummary,
};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Main server implementation
#[derive(Clone)]
pub struct SluiceServer {
    /// Configuration
    pub config: ServerConfig,

    /// Job execution service
    runtime: Arc<JobExecutionService>,

    /// Container platform client
    provider: Arc<dyn ContainerProvider>,

    /// Server address (might be different from configured if port is 0)
    address: Option<SocketAddr>,
}

/// Manual Debug implementation that doesn't try to debug the runtime
impl std::fmt::Debug for SluiceServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SluiceServer")
            .field("config", &self.config)
            .field("provider", &self.provider)
            .finish()
    }
}

impl SluiceServer {
    /// Create a new SluiceServer
    pub fn new(
        config: ServerConfig,
        runtime: Arc<JobExecutionService>,
        provider: Arc<dyn ContainerProvider>,
    ) -> Self {
        Self {
            config,
            runtime,
            provider,
            address: None,
        }
    }

    /// Run the server
    pub async fn run(mut self) -> ServerResult<()> {
        info!("Starting Sluice Server");

        // Build the API router
        let app = crate::api::build_router(Arc::new(self.clone()));

        // Create and bind the TCP listener
        let ip = self.config.bind_address.parse().map_err(|_| {
            ServerError::ConfigError(format!(
                "Invalid bind address: {}",
                self.config.bind_address
            ))
        })?;
        let listener = TcpListener::bind(SocketAddr::new(ip, self.config.port)).await?;
        let addr = listener.local_addr()?;

        // Store the actual bound address
        self.address = Some(addr);
        info!("Listening on {}", addr);

        // Run the server
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Get the server's bound address
    pub fn address(&self) -> SocketAddr {
        self.address
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], self.config.port)))
    }

    /// Start a new job for the given video URL
    pub async fn start_job(&self, video_url: String) -> ServerResult<JobId> {
        let job_id = self.runtime.start_job(JobRequest { video_url }).await?;
        Ok(job_id)
    }

    /// Get a job by ID
    pub async fn get_job(&self, job_id: &JobId) -> ServerResult<Option<Job>> {
        Ok(self.runtime.get_job(job_id).await?)
    }

    /// List job summaries with an optional status filter
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> ServerResult<Vec<JobSummary>> {
        Ok(self.runtime.list_jobs(status).await?)
    }

    /// Deliver an external event to a job
    pub async fn raise_event(
        &self,
        job_id: &JobId,
        event_name: &str,
        payload: Value,
    ) -> ServerResult<()> {
        self.runtime.raise_event(job_id, event_name, payload).await?;
        Ok(())
    }

    /// Management URIs returned from the start endpoint: where to query
    /// status and where to post events. The event URI keeps a literal
    /// `{eventName}` placeholder for the caller to substitute.
    pub fn management_uris(&self, job_id: &JobId) -> (String, String) {
        let base = self.config.callback_base_url.trim_end_matches('/');
        (
            format!("{}/v1/jobs/{}", base, job_id),
            format!("{}/v1/jobs/{}/events/{{eventName}}", base, job_id),
        )
    }

    /// Check container provider health
    pub async fn check_provider_health(&self) -> ServerResult<bool> {
        Ok(self.provider.health_check().await?)
    }
}
