//!
//! Sluice Server - HTTP orchestration server for Sluice
//!
//! This module exports all the components of the Sluice Server.

// External dependencies
use std::sync::Arc;
use std::time::Duration;

use sluice_core::{
    domain::repository::memory::MemoryJobRepository, ContainerProvider, ExecutionSettings,
    JobExecutionService, LoggingEventHandler,
};
use sluice_provider::{
    AciSettings, AzureContainerInstances, FileShareMount, ManagedIdentityCredential,
    MemoryContainerProvider, RegistryCredentials,
};

/// API module
pub mod api;

/// Server module
pub mod server;

/// Configuration module
pub mod config;

/// Error module
pub mod error;

/// Completion queue relay module
pub mod relay;

// Re-export key types
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use relay::CompletionRelay;
pub use server::SluiceServer;

/// Run function
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    // Initialize logging
    init_logging(&config);

    // Create dependencies
    let provider = create_provider(&config)?;
    let runtime = create_runtime(&config, provider.clone());

    // Start the completion queue relay when a queue is configured
    if let Some(queue_url) = config.completion_queue_url.clone() {
        let relay = CompletionRelay::new(
            runtime.clone(),
            queue_url,
            Duration::from_secs(config.completion_queue_poll_seconds),
        );
        tokio::spawn(relay.run());
    }

    // Create and run the server
    let server = SluiceServer::new(config, runtime, provider);
    server.run().await
}

/// Initialize logging
fn init_logging(config: &ServerConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    // Create filter based on config
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Initialize subscriber
    fmt().with_env_filter(filter).with_target(true).init();
}

/// Create the container provider selected by the provider URL
pub fn create_provider(config: &ServerConfig) -> ServerResult<Arc<dyn ContainerProvider>> {
    if config.provider_url.starts_with("memory://") {
        // In-memory provider for development and testing
        tracing::info!("Using in-memory container provider");
        return Ok(Arc::new(MemoryContainerProvider::new()));
    }

    if let Some(rest) = config.provider_url.strip_prefix("azure://") {
        // Format: azure://{subscription_id}/{resource_group}
        let mut parts = rest.splitn(2, '/');

        let subscription_id = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| {
            ServerError::ConfigError("Missing subscription ID in provider URL".to_string())
        })?;
        let resource_group = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| {
            ServerError::ConfigError("Missing resource group in provider URL".to_string())
        })?;

        let image = config.container_image.clone().ok_or_else(|| {
            ServerError::ConfigError("CONTAINER_IMAGE is required for the azure:// provider".to_string())
        })?;

        let registry = match (
            &config.container_registry_server,
            &config.container_registry_username,
            &config.container_registry_password,
        ) {
            (Some(server), Some(username), Some(password)) => Some(RegistryCredentials {
                server: server.clone(),
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        let file_share = match (
            &config.file_share_name,
            &config.storage_account_name,
            &config.storage_account_key,
        ) {
            (Some(share_name), Some(account_name), Some(account_key)) => Some(FileShareMount {
                share_name: share_name.clone(),
                storage_account_name: account_name.clone(),
                storage_account_key: account_key.clone(),
            }),
            _ => None,
        };

        let settings = AciSettings {
            location: config.azure_location.clone(),
            image,
            registry,
            file_share,
            storage_container: config.storage_container.clone(),
            storage_account_name: config.storage_account_name.clone(),
            identity_resource_id: config.managed_identity_resource_id.clone(),
            ..Default::default()
        };

        let credential = Arc::new(ManagedIdentityCredential::new(
            config.managed_identity_client_id.clone(),
        ));

        tracing::info!(%subscription_id, %resource_group, "Using Azure Container Instances provider");
        return Ok(Arc::new(AzureContainerInstances::new(
            subscription_id.to_string(),
            resource_group.to_string(),
            settings,
            credential,
        )));
    }

    Err(ServerError::ConfigError(format!(
        "Unsupported provider URL: {}",
        config.provider_url
    )))
}

/// Create the job execution service over an in-memory job store
pub fn create_runtime(
    config: &ServerConfig,
    provider: Arc<dyn ContainerProvider>,
) -> Arc<JobExecutionService> {
    Arc::new(JobExecutionService::new(
        Arc::new(MemoryJobRepository::new()),
        provider,
        Arc::new(LoggingEventHandler),
        ExecutionSettings {
            container_name_prefix: config.container_name_prefix.clone(),
            callback_base_url: config.callback_base_url.clone(),
            completion_timeout: config.completion_timeout_seconds.map(Duration::from_secs),
        },
    ))
}
