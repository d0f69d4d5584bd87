//! Token acquisition for the Azure management API
//!
//! The service authenticates with a user-assigned managed identity: tokens
//! come from the instance metadata endpoint and are cached until shortly
//! before they expire.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;

use sluice_core::CoreError;

const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

/// How long before expiry a cached token is considered stale
const REFRESH_MARGIN_SECONDS: i64 = 300;

/// Source of bearer tokens for the management API
#[async_trait]
pub trait TokenCredential: Send + Sync + Debug {
    /// Get a valid access token
    async fn get_token(&self) -> Result<String, CoreError>;
}

/// Fixed token, for tests and local development
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    /// Create a credential that always returns the given token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self) -> Result<String, CoreError> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ImdsTokenResponse {
    access_token: String,
    expires_on: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Managed-identity credential backed by the instance metadata service
#[derive(Debug)]
pub struct ManagedIdentityCredential {
    /// Client ID of the user-assigned identity, when not using the
    /// system-assigned one
    client_id: Option<String>,

    /// Metadata endpoint
    endpoint: String,

    /// HTTP client
    client: Client,

    /// Cached token
    cached: tokio::sync::RwLock<Option<CachedToken>>,
}

impl ManagedIdentityCredential {
    /// Create a new managed-identity credential
    pub fn new(client_id: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client_id,
            endpoint: DEFAULT_IMDS_ENDPOINT.to_string(),
            client,
            cached: tokio::sync::RwLock::new(None),
        }
    }

    /// Override the metadata endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn request_token(&self) -> Result<CachedToken, CoreError> {
        let mut query = vec![
            ("api-version", IMDS_API_VERSION.to_string()),
            ("resource", MANAGEMENT_RESOURCE.to_string()),
        ];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.clone()));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .header("Metadata", "true")
            .query(&query)
            .send()
            .await
            .map_err(|e| CoreError::ProviderError(format!("IMDS request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(CoreError::ProviderError(format!(
                "IMDS token request failed: {}",
                error_body
            )));
        }

        let token: ImdsTokenResponse = response
            .json()
            .await
            .map_err(|e| CoreError::ProviderError(format!("Invalid IMDS response: {}", e)))?;

        let expires_on = token.expires_on.parse::<i64>().map_err(|_| {
            CoreError::ProviderError(format!("Invalid token expiry: {}", token.expires_on))
        })?;
        let expires_at = DateTime::from_timestamp(expires_on, 0).ok_or_else(|| {
            CoreError::ProviderError(format!("Invalid token expiry: {}", expires_on))
        })?;

        debug!(%expires_at, "acquired management API token");

        Ok(CachedToken {
            token: token.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self) -> Result<String, CoreError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                let stale_at = token.expires_at - chrono::Duration::seconds(REFRESH_MARGIN_SECONDS);
                if Utc::now() < stale_at {
                    return Ok(token.token.clone());
                }
            }
        }

        let token = self.request_token().await?;
        let access_token = token.token.clone();
        *self.cached.write().await = Some(token);
        Ok(access_token)
    }
}
