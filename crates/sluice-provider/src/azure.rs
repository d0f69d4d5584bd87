//! Azure Container Instances implementation of the ContainerProvider port
//!
//! This module talks to the Azure management REST API directly: one PUT to
//! create a container group, one DELETE to remove it.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use sluice_core::{ContainerGroup, ContainerGroupSpec, ContainerProvider, CoreError};

use crate::identity::TokenCredential;

const API_VERSION: &str = "2023-05-01";
const DEFAULT_API_BASE_URL: &str = "https://management.azure.com";

/// Name of the scratch volume mounted into the worker container
const WORK_VOLUME_NAME: &str = "work-volume";

/// Mount path of the scratch volume inside the worker container
const WORK_VOLUME_MOUNT_PATH: &str = "/workdir";

/// Private registry credentials for pulling the worker image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryCredentials {
    /// Registry server, e.g. `myregistry.azurecr.io`
    pub server: String,

    /// Registry username
    pub username: String,

    /// Registry password
    pub password: String,
}

/// Azure file share mounted into the worker container as scratch space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileShareMount {
    /// File share name
    pub share_name: String,

    /// Storage account holding the share
    pub storage_account_name: String,

    /// Storage account key
    pub storage_account_key: String,
}

/// Static configuration for the container groups this provider creates
#[derive(Debug, Clone)]
pub struct AciSettings {
    /// Azure region the groups are created in
    pub location: String,

    /// Worker container image
    pub image: String,

    /// Private registry credentials, when the image is not public
    pub registry: Option<RegistryCredentials>,

    /// Scratch file share mounted at /workdir
    pub file_share: Option<FileShareMount>,

    /// Blob container the worker writes its results to
    pub storage_container: String,

    /// Storage account the worker writes its results to
    pub storage_account_name: Option<String>,

    /// Resource ID of the user-assigned identity attached to the group
    pub identity_resource_id: Option<String>,

    /// CPU cores per worker
    pub cpu_cores: f64,

    /// Memory in GiB per worker
    pub memory_gb: f64,

    /// Exposed TCP port
    pub port: u16,
}

impl Default for AciSettings {
    fn default() -> Self {
        Self {
            location: "eastus".to_string(),
            image: String::new(),
            registry: None,
            file_share: None,
            storage_container: "extractions".to_string(),
            storage_account_name: None,
            identity_resource_id: None,
            cpu_cores: 1.0,
            memory_gb: 3.0,
            port: 80,
        }
    }
}

/// Azure Container Instances implementation of ContainerProvider
#[derive(Debug, Clone)]
pub struct AzureContainerInstances {
    /// Azure subscription ID
    subscription_id: String,

    /// Resource group the container groups live in
    resource_group: String,

    /// Group configuration
    settings: AciSettings,

    /// Token source for the management API
    credential: Arc<dyn TokenCredential>,

    /// Base URL for the management API
    api_base_url: String,

    /// HTTP client
    client: Client,
}

impl AzureContainerInstances {
    /// Create a new AzureContainerInstances provider
    pub fn new(
        subscription_id: String,
        resource_group: String,
        settings: AciSettings,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            subscription_id,
            resource_group,
            settings,
            credential,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            client,
        }
    }

    /// Override the management API base URL
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Get the collection URL for container groups in the resource group
    fn container_groups_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerInstance/containerGroups",
            self.api_base_url, self.subscription_id, self.resource_group
        )
    }

    /// Get the URL for a specific container group
    fn container_group_url(&self, name: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.container_groups_url(),
            name,
            API_VERSION
        )
    }

    /// Build the container group resource body for one job
    fn container_group_body(&self, spec: &ContainerGroupSpec) -> Value {
        let mut environment = vec![
            json!({"name": "CALLBACK_URL", "value": spec.callback_url}),
            json!({"name": "VIDEO_URL", "value": spec.video_url}),
            json!({"name": "STORAGE_CONTAINER", "value": self.settings.storage_container}),
        ];
        if let Some(account) = &self.settings.storage_account_name {
            environment.push(json!({"name": "STORAGE_ACCOUNT", "value": account}));
        }

        let mut container_properties = json!({
            "image": self.settings.image,
            "resources": {
                "requests": {
                    "cpu": self.settings.cpu_cores,
                    "memoryInGB": self.settings.memory_gb,
                }
            },
            "ports": [{"port": self.settings.port, "protocol": "TCP"}],
            "environmentVariables": environment,
        });
        if self.settings.file_share.is_some() {
            container_properties["volumeMounts"] = json!([{
                "name": WORK_VOLUME_NAME,
                "mountPath": WORK_VOLUME_MOUNT_PATH,
            }]);
        }

        let mut properties = json!({
            "osType": "Linux",
            "containers": [{
                "name": spec.name,
                "properties": container_properties,
            }],
            "ipAddress": {
                "type": "Public",
                "ports": [{"port": self.settings.port, "protocol": "TCP"}],
                "dnsNameLabel": spec.name,
            },
        });
        if let Some(registry) = &self.settings.registry {
            properties["imageRegistryCredentials"] = json!([{
                "server": registry.server,
                "username": registry.username,
                "password": registry.password,
            }]);
        }
        if let Some(share) = &self.settings.file_share {
            properties["volumes"] = json!([{
                "name": WORK_VOLUME_NAME,
                "azureFile": {
                    "shareName": share.share_name,
                    "storageAccountName": share.storage_account_name,
                    "storageAccountKey": share.storage_account_key,
                },
            }]);
        }

        let mut body = json!({
            "location": self.settings.location,
            "properties": properties,
        });
        if let Some(identity_id) = &self.settings.identity_resource_id {
            let mut identities = serde_json::Map::new();
            identities.insert(identity_id.clone(), json!({}));
            body["identity"] = json!({
                "type": "UserAssigned",
                "userAssignedIdentities": identities,
            });
        }

        body
    }
}

#[async_trait]
impl ContainerProvider for AzureContainerInstances {
    async fn create_container_group(
        &self,
        spec: &ContainerGroupSpec,
    ) -> Result<ContainerGroup, CoreError> {
        info!(container_group = %spec.name, "Creating container group");

        let token = self.credential.get_token().await?;
        let response = self
            .client
            .put(self.container_group_url(&spec.name))
            .header("Authorization", format!("Bearer {}", token))
            .json(&self.container_group_body(spec))
            .send()
            .await
            .map_err(|e| CoreError::ProviderError(e.to_string()))?;

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(container_group = %spec.name, %error_body, "Failed to create container group");
            return Err(CoreError::ProviderError(format!(
                "Failed to create container group {}: {}",
                spec.name, error_body
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| CoreError::ProviderError(e.to_string()))?;

        let ip_address = result["properties"]["ipAddress"]["ip"]
            .as_str()
            .map(str::to_string);
        let fqdn = result["properties"]["ipAddress"]["fqdn"]
            .as_str()
            .map(str::to_string);

        info!(
            container_group = %spec.name,
            fqdn = fqdn.as_deref().unwrap_or("-"),
            "Container group created"
        );

        Ok(ContainerGroup {
            name: spec.name.clone(),
            ip_address,
            fqdn,
        })
    }

    async fn delete_container_group(&self, name: &str) -> Result<(), CoreError> {
        info!(container_group = %name, "Deleting container group");

        let token = self.credential.get_token().await?;
        let response = self
            .client
            .delete(self.container_group_url(name))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| CoreError::ProviderError(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(container_group = %name, "Container group already gone");
            return Ok(());
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(container_group = %name, %error_body, "Failed to delete container group");
            return Err(CoreError::ProviderError(format!(
                "Failed to delete container group {}: {}",
                name, error_body
            )));
        }

        Ok(())
    }

    async fn container_group_exists(&self, name: &str) -> Result<bool, CoreError> {
        let token = self.credential.get_token().await?;
        let response = self
            .client
            .get(self.container_group_url(name))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| CoreError::ProviderError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            let error_body = response.text().await.unwrap_or_default();
            Err(CoreError::ProviderError(format!(
                "Failed to query container group {}: {}",
                name, error_body
            )))
        }
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        let token = self.credential.get_token().await?;
        let response = self
            .client
            .get(format!(
                "{}?api-version={}",
                self.container_groups_url(),
                API_VERSION
            ))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| CoreError::ProviderError(e.to_string()))?;

        Ok(response.status().is_success())
    }
}
