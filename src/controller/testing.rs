//! Mock implementations for controller tests
//!
//! These mocks script the stream, fallback, and registry seams so scenarios
//! run without real I/O.

use crate::error::ClientError;
use crate::fallback::{FallbackClient, FallbackReply};
use crate::registry::{AgentSummary, RegistrySync};
use crate::stream::{StreamConsumer, StreamEvent, StreamHandle};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One scripted stream: pre-buffered items plus whether the channel stays
/// open afterwards (to model a stream that stalls rather than closes)
enum Script {
    Stream {
        items: Vec<Result<StreamEvent, ClientError>>,
        hold_open: bool,
    },
    OpenError(ClientError),
}

/// Mock stream consumer returning queued scripts
pub struct MockStreamConsumer {
    scripts: Mutex<VecDeque<Script>>,
    /// Queries passed to `open`, in order
    pub opened: Mutex<Vec<String>>,
    /// Senders kept alive so held-open channels never close
    held: Mutex<Vec<mpsc::Sender<Result<StreamEvent, ClientError>>>>,
}

impl MockStreamConsumer {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            opened: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
        }
    }

    /// Queue a stream that delivers `items` and then closes
    pub fn queue_events(&self, items: Vec<Result<StreamEvent, ClientError>>) {
        self.scripts.lock().unwrap().push_back(Script::Stream {
            items,
            hold_open: false,
        });
    }

    /// Queue a stream that delivers `items` and then stays open forever
    pub fn queue_events_hold_open(&self, items: Vec<Result<StreamEvent, ClientError>>) {
        self.scripts.lock().unwrap().push_back(Script::Stream {
            items,
            hold_open: true,
        });
    }

    /// Queue an `open` failure
    pub fn queue_open_error(&self, error: ClientError) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::OpenError(error));
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

impl Default for MockStreamConsumer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamConsumer for MockStreamConsumer {
    async fn open(&self, query: &str) -> Result<StreamHandle, ClientError> {
        self.opened.lock().unwrap().push(query.to_string());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::OpenError(ClientError::transport(
                "No scripted stream queued",
            )));

        match script {
            Script::OpenError(e) => Err(e),
            Script::Stream { items, hold_open } => {
                let (tx, rx) = mpsc::channel(items.len().max(1));
                for item in items {
                    tx.try_send(item).expect("scripted channel overflow");
                }
                if hold_open {
                    self.held.lock().unwrap().push(tx);
                }
                Ok(StreamHandle::new(rx, CancellationToken::new()))
            }
        }
    }
}

/// Mock fallback client returning queued replies and recording calls
pub struct MockFallbackClient {
    replies: Mutex<VecDeque<Result<FallbackReply, ClientError>>>,
    /// Queries passed to `send`, in order
    pub calls: Mutex<Vec<String>>,
}

impl MockFallbackClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_reply(&self, reply: FallbackReply) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn queue_error(&self, error: ClientError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockFallbackClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FallbackClient for MockFallbackClient {
    async fn send(&self, query: &str) -> Result<FallbackReply, ClientError> {
        self.calls.lock().unwrap().push(query.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::transport("No fallback reply queued")))
    }
}

/// Mock registry with fixed health and directory
pub struct MockRegistry {
    healthy: bool,
    agents: Result<Vec<AgentSummary>, ClientError>,
    pub health_calls: Mutex<usize>,
    pub list_calls: Mutex<usize>,
}

impl MockRegistry {
    pub fn healthy_with(agents: Vec<AgentSummary>) -> Self {
        Self {
            healthy: true,
            agents: Ok(agents),
            health_calls: Mutex::new(0),
            list_calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            healthy: true,
            agents: Err(ClientError::transport("registry unreachable")),
            health_calls: Mutex::new(0),
            list_calls: Mutex::new(0),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            agents: Ok(Vec::new()),
            health_calls: Mutex::new(0),
            list_calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl RegistrySync for MockRegistry {
    async fn check_health(&self) -> Result<bool, ClientError> {
        *self.health_calls.lock().unwrap() += 1;
        Ok(self.healthy)
    }

    async fn list_agents(&self) -> Result<Vec<AgentSummary>, ClientError> {
        *self.list_calls.lock().unwrap() += 1;
        self.agents.clone()
    }
}

/// Shorthand for a routing snapshot used across scenario tests
pub fn math_routing() -> crate::stream::RoutingInfo {
    crate::stream::RoutingInfo {
        agent_id: "agent-math".to_string(),
        agent_name: "math".to_string(),
        protocol: Some("acp".to_string()),
        confidence: Some(0.93),
        reasoning: Some("arithmetic query".to_string()),
    }
}

/// Shorthand for a completed payload matching [`math_routing`]
pub fn math_completed() -> crate::stream::CompletedPayload {
    crate::stream::CompletedPayload {
        agent_id: Some("agent-math".to_string()),
        agent_name: Some("math".to_string()),
        protocol: Some("acp".to_string()),
        response_data: None,
        confidence: Some(0.93),
        timestamp: None,
    }
}
