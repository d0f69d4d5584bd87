//! Container provider port
//!
//! The core runtime only describes the container group it needs; how the
//! group is created and destroyed is owned by provider implementations in
//! external crates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::CoreError;

/// What the coordinator asks a provider to create for one job.
///
/// Everything else about the group (image, region, resources, volumes,
/// credentials) is provider configuration, not per-job input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerGroupSpec {
    /// Container group name, derived from the job ID
    pub name: String,

    /// The video URL handed to the worker container
    pub video_url: String,

    /// The callback URL the worker invokes to signal completion
    pub callback_url: String,
}

/// A provisioned container group as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerGroup {
    /// Container group name
    pub name: String,

    /// Public IP address, if the provider assigned one
    pub ip_address: Option<String>,

    /// Fully qualified domain name, if the provider assigned one
    pub fqdn: Option<String>,
}

/// Interface for container platform operations
#[async_trait]
pub trait ContainerProvider: Send + Sync + Debug {
    /// Create a container group for a job
    async fn create_container_group(
        &self,
        spec: &ContainerGroupSpec,
    ) -> Result<ContainerGroup, CoreError>;

    /// Delete a container group by name.
    ///
    /// Deleting a group that no longer exists succeeds.
    async fn delete_container_group(&self, name: &str) -> Result<(), CoreError>;

    /// Check whether a container group exists
    async fn container_group_exists(&self, name: &str) -> Result<bool, CoreError>;

    /// Get health status
    async fn health_check(&self) -> Result<bool, CoreError>;
}
