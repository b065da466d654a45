//! Best-effort agent registry refresh
//!
//! The controller calls this once after a completed stream that resolved an
//! agent id. Failures never alter transcript or phase state.

use crate::config::Config;
use crate::error::ClientError;
use async_trait::async_trait;
use serde::Deserialize;

/// Summary of one agent known to the orchestrator
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub agent_name: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Health and agent-directory queries against the orchestrator
#[async_trait]
pub trait RegistrySync: Send + Sync {
    /// Whether the orchestrator reports itself healthy
    async fn check_health(&self) -> Result<bool, ClientError>;

    /// Current agent directory
    async fn list_agents(&self) -> Result<Vec<AgentSummary>, ClientError>;
}

#[async_trait]
impl<T: RegistrySync + ?Sized> RegistrySync for std::sync::Arc<T> {
    async fn check_health(&self) -> Result<bool, ClientError> {
        (**self).check_health().await
    }

    async fn list_agents(&self) -> Result<Vec<AgentSummary>, ClientError> {
        (**self).list_agents().await
    }
}

/// HTTP registry client against `<base>/health` and `<base>/agents`
pub struct HttpRegistryClient {
    client: reqwest::Client,
    health_endpoint: String,
    agents_endpoint: String,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

impl HttpRegistryClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        let base = config.base_url.trim_end_matches('/');
        Self {
            client,
            health_endpoint: format!("{base}/health"),
            agents_endpoint: format!("{base}/agents"),
        }
    }
}

#[async_trait]
impl RegistrySync for HttpRegistryClient {
    async fn check_health(&self) -> Result<bool, ClientError> {
        let response = self
            .client
            .get(&self.health_endpoint)
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("Health check failed: {e}")))?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| ClientError::protocol(format!("Failed to parse health response: {e}")))?;
        Ok(health.status == "healthy")
    }

    async fn list_agents(&self) -> Result<Vec<AgentSummary>, ClientError> {
        let response = self
            .client
            .get(&self.agents_endpoint)
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("Agent listing failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::application(format!(
                "Agent listing rejected: HTTP {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::protocol(format!("Failed to parse agent listing: {e}")))
    }
}
