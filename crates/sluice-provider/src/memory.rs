//! In-memory implementation of the ContainerProvider port
//!
//! Used by development configurations and tests; no containers are
//! actually created.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

use sluice_core::{ContainerGroup, ContainerGroupSpec, ContainerProvider, CoreError};

/// In-memory container provider over a concurrent map
#[derive(Debug, Clone, Default)]
pub struct MemoryContainerProvider {
    groups: Arc<DashMap<String, ContainerGroup>>,
}

impl MemoryContainerProvider {
    /// Create a new memory container provider
    pub fn new() -> Self {
        Self {
            groups: Arc::new(DashMap::new()),
        }
    }

    /// Number of live container groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no container groups are live
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[async_trait]
impl ContainerProvider for MemoryContainerProvider {
    async fn create_container_group(
        &self,
        spec: &ContainerGroupSpec,
    ) -> Result<ContainerGroup, CoreError> {
        let group = ContainerGroup {
            name: spec.name.clone(),
            ip_address: Some("127.0.0.1".to_string()),
            fqdn: Some(format!("{}.local", spec.name)),
        };

        info!(container_group = %spec.name, "Created in-memory container group");
        self.groups.insert(spec.name.clone(), group.clone());
        Ok(group)
    }

    async fn delete_container_group(&self, name: &str) -> Result<(), CoreError> {
        // Deleting a group that never existed matches the Azure client's
        // 404 tolerance.
        self.groups.remove(name);
        Ok(())
    }

    async fn container_group_exists(&self, name: &str) -> Result<bool, CoreError> {
        Ok(self.groups.contains_key(name))
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        Ok(true)
    }
}
