//! Typed events carried by the orchestrator's response stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One parsed stream frame
///
/// Wire form is adjacently tagged: `{"kind": "...", "payload": {...}}`.
/// This is the closed set; anything else is a protocol error and the frame
/// is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Server acknowledged the query
    RequestReceived,
    /// Routing decision in progress
    RoutingStarted,
    /// Routing resolved to an agent
    RoutingCompleted(RoutingInfo),
    /// The selected agent began executing
    AgentExecutionStarted { agent_id: String },
    /// One increment of assistant text
    ResponseChunk { text: String },
    /// The turn finished successfully
    Completed(CompletedPayload),
    /// The server ran the request and reports failure
    Error { message: String },
}

/// Routing metadata resolved by the backend before execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingInfo {
    pub agent_id: String,
    pub agent_name: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Payload of the terminal `completed` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedPayload {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    /// Full response body as the server assembled it; the client keeps its
    /// own chunk accumulation as the displayed content
    #[serde(default)]
    pub response_data: Option<serde_json::Value>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}
