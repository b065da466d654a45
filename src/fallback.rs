//! Non-streaming fallback path
//!
//! Used only when the stream fails before completion. Exactly one request is
//! issued per user query; this path never retries and never re-attempts
//! streaming.

use crate::config::Config;
use crate::error::ClientError;
use async_trait::async_trait;
use serde::Deserialize;

/// Completed-equivalent record returned by the fallback path. No intermediate
/// phase data exists, since none was observed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FallbackReply {
    pub content: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Issues a single non-streaming request carrying the identical query text
#[async_trait]
pub trait FallbackClient: Send + Sync {
    async fn send(&self, query: &str) -> Result<FallbackReply, ClientError>;
}

#[async_trait]
impl<T: FallbackClient + ?Sized> FallbackClient for std::sync::Arc<T> {
    async fn send(&self, query: &str) -> Result<FallbackReply, ClientError> {
        (**self).send(query).await
    }
}

/// HTTP fallback client against `<base>/query`
pub struct HttpFallbackClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpFallbackClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            endpoint: format!("{}/query", config.base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl FallbackClient for HttpFallbackClient {
    async fn send(&self, query: &str) -> Result<FallbackReply, ClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::transport(format!("Fallback request timeout: {e}"))
                } else if e.is_connect() {
                    ClientError::transport(format!("Fallback connection failed: {e}"))
                } else {
                    ClientError::transport(format!("Fallback request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::transport(format!("Failed to read fallback response: {e}")))?;

        if !status.is_success() {
            return Err(ClientError::application(format!("HTTP {status}: {body}")));
        }

        serde_json::from_str(&body).map_err(|e| {
            ClientError::protocol(format!("Failed to parse fallback response: {e} - body: {body}"))
        })
    }
}
