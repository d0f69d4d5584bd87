//! Configuration for the Sluice Server
//!
//! This module contains the configuration types and loading functionality.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use crate::error::{ServerError, ServerResult};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub bind_address: String,

    /// Container provider URL: `memory://local` or
    /// `azure://{subscription_id}/{resource_group}`
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// Base URL workers reach this server under; completion callbacks and
    /// the management URIs in start responses are built from it
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,

    /// Prefix for derived container group names
    #[serde(default = "default_container_name_prefix")]
    pub container_name_prefix: String,

    /// How long a job may wait for its completion signal, in seconds
    #[serde(default)]
    pub completion_timeout_seconds: Option<u64>,

    /// SAS URL of the completion queue; enables the queue relay when set
    #[serde(default)]
    pub completion_queue_url: Option<String>,

    /// Poll interval of the completion queue relay, in seconds
    #[serde(default = "default_queue_poll_seconds")]
    pub completion_queue_poll_seconds: u64,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Azure region container groups are created in
    #[serde(default = "default_azure_location")]
    pub azure_location: String,

    /// Worker container image
    #[serde(default)]
    pub container_image: Option<String>,

    /// Private registry server
    #[serde(default)]
    pub container_registry_server: Option<String>,

    /// Private registry username
    #[serde(default)]
    pub container_registry_username: Option<String>,

    /// Private registry password
    #[serde(default)]
    pub container_registry_password: Option<String>,

    /// Scratch file share mounted into workers
    #[serde(default)]
    pub file_share_name: Option<String>,

    /// Storage account for the file share and result container
    #[serde(default)]
    pub storage_account_name: Option<String>,

    /// Storage account key for the file share
    #[serde(default)]
    pub storage_account_key: Option<String>,

    /// Blob container workers write their results to
    #[serde(default = "default_storage_container")]
    pub storage_container: String,

    /// Client ID of the user-assigned managed identity used for the
    /// management API
    #[serde(default)]
    pub managed_identity_client_id: Option<String>,

    /// Resource ID of the user-assigned identity attached to workers
    #[serde(default)]
    pub managed_identity_resource_id: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_provider_url() -> String {
    "memory://local".to_string()
}

fn default_callback_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_container_name_prefix() -> String {
    "extract".to_string()
}

fn default_queue_poll_seconds() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_azure_location() -> String {
    "eastus".to_string()
}

fn default_storage_container() -> String {
    "extractions".to_string()
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn load() -> ServerResult<Self> {
        // Start with defaults
        let mut config = Self::default();

        // Override from environment variables
        if let Ok(port) = env::var("SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.port = port;
            } else {
                warn!("Invalid SERVER_PORT value: {}", port);
            }
        }

        if let Ok(host) = env::var("SERVER_HOST") {
            config.bind_address = host;
        }

        if let Ok(provider_url) = env::var("PROVIDER_URL") {
            config.provider_url = provider_url;
        }

        if let Ok(callback_base_url) = env::var("CALLBACK_BASE_URL") {
            config.callback_base_url = callback_base_url;
        }

        if let Ok(prefix) = env::var("CONTAINER_NAME_PREFIX") {
            config.container_name_prefix = prefix;
        }

        if let Ok(timeout) = env::var("COMPLETION_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.completion_timeout_seconds = Some(seconds);
            } else {
                warn!("Invalid COMPLETION_TIMEOUT_SECONDS value: {}", timeout);
            }
        }

        if let Ok(queue_url) = env::var("COMPLETION_QUEUE_URL") {
            config.completion_queue_url = Some(queue_url);
        }

        if let Ok(poll) = env::var("COMPLETION_QUEUE_POLL_SECONDS") {
            if let Ok(seconds) = poll.parse::<u64>() {
                config.completion_queue_poll_seconds = seconds;
            } else {
                warn!("Invalid COMPLETION_QUEUE_POLL_SECONDS value: {}", poll);
            }
        }

        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(location) = env::var("AZURE_LOCATION") {
            config.azure_location = location;
        }

        if let Ok(image) = env::var("CONTAINER_IMAGE") {
            config.container_image = Some(image);
        }

        if let Ok(server) = env::var("CONTAINER_REGISTRY_SERVER") {
            config.container_registry_server = Some(server);
        }

        if let Ok(username) = env::var("CONTAINER_REGISTRY_USERNAME") {
            config.container_registry_username = Some(username);
        }

        if let Ok(password) = env::var("CONTAINER_REGISTRY_PASSWORD") {
            config.container_registry_password = Some(password);
        }

        if let Ok(share) = env::var("FILE_SHARE_NAME") {
            config.file_share_name = Some(share);
        }

        if let Ok(account) = env::var("STORAGE_ACCOUNT_NAME") {
            config.storage_account_name = Some(account);
        }

        if let Ok(key) = env::var("STORAGE_ACCOUNT_KEY") {
            config.storage_account_key = Some(key);
        }

        if let Ok(container) = env::var("STORAGE_CONTAINER") {
            config.storage_container = container;
        }

        if let Ok(client_id) = env::var("MANAGED_IDENTITY_CLIENT_ID") {
            config.managed_identity_client_id = Some(client_id);
        }

        if let Ok(resource_id) = env::var("MANAGED_IDENTITY_RESOURCE_ID") {
            config.managed_identity_resource_id = Some(resource_id);
        }

        config.validate()?;

        info!("Loaded server configuration");
        Ok(config)
    }

    /// Validate required fields and warn about risky combinations
    pub fn validate(&self) -> ServerResult<()> {
        if self.provider_url.is_empty() {
            return Err(ServerError::ConfigError(
                "Provider URL is required".to_string(),
            ));
        }

        if self.provider_url.starts_with("azure://") {
            match &self.container_image {
                Some(image) if !image.is_empty() => {}
                _ => {
                    return Err(ServerError::ConfigError(
                        "CONTAINER_IMAGE is required for the azure:// provider".to_string(),
                    ));
                }
            }

            if self.managed_identity_client_id.is_none() {
                warn!("No MANAGED_IDENTITY_CLIENT_ID provided - using the system-assigned identity");
            }
        }

        if self.container_registry_server.is_some()
            && (self.container_registry_username.is_none()
                || self.container_registry_password.is_none())
        {
            warn!("Container registry server set but credentials are incomplete - image pulls may fail");
        }

        if self.file_share_name.is_some()
            && (self.storage_account_name.is_none() || self.storage_account_key.is_none())
        {
            warn!("File share configured without storage account name and key - the mount will be skipped");
        }

        if self.completion_queue_url.is_none() {
            warn!("No COMPLETION_QUEUE_URL provided - completion signals arrive over HTTP only");
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_host(),
            provider_url: default_provider_url(),
            callback_base_url: default_callback_base_url(),
            container_name_prefix: default_container_name_prefix(),
            completion_timeout_seconds: None,
            completion_queue_url: None,
            completion_queue_poll_seconds: default_queue_poll_seconds(),
            log_level: default_log_level(),
            azure_location: default_azure_location(),
            container_image: None,
            container_registry_server: None,
            container_registry_username: None,
            container_registry_password: None,
            file_share_name: None,
            storage_account_name: None,
            storage_account_key: None,
            storage_container: default_storage_container(),
            managed_identity_client_id: None,
            managed_identity_resource_id: None,
        }
    }
}
