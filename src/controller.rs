//! Streaming response reconciliation
//!
//! The controller consumes one stream event at a time and reconciles it into
//! the transcript: phase transitions, exact-order chunk accumulation, a single
//! fallback attempt when the transport fails before completion, and a
//! best-effort registry refresh after a completed turn. At most one entry is
//! ever in flight.

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub mod testing;

use crate::error::ClientError;
use crate::fallback::FallbackClient;
use crate::registry::{AgentSummary, RegistrySync};
use crate::stream::{RoutingInfo, StreamConsumer, StreamEvent, StreamHandle};
use crate::transcript::{Message, Role, StorageProvider, TranscriptStore};
use std::time::Duration;

/// The controller's current stage. Ordered by progression: mid-stream
/// transitions only ever move forward, and only abort or finalization may
/// move the phase back to [`Phase::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Phase {
    /// Initial, post-abort, and post-finalize state
    #[default]
    Idle,
    /// Query submitted, waiting for the routing decision
    Routing,
    /// Agent selected, waiting for the first chunk
    Executing,
    /// Chunks arriving
    Streaming,
    /// Terminal: turn finalized successfully
    Completed,
    /// Terminal: turn finalized with a failure
    Error,
}

/// Transient streaming state, replaced wholesale on every transition so no
/// reader ever observes a half-updated value. Not persisted.
#[derive(Debug, Clone, Default)]
pub struct StreamingState {
    pub phase: Phase,
    pub is_streaming: bool,
    /// Running concatenation of chunk text, in arrival order
    pub accumulated: String,
    /// Snapshot captured at `routing_completed`
    pub routing: Option<RoutingInfo>,
}

impl StreamingState {
    fn idle() -> Self {
        Self::default()
    }

    fn opened() -> Self {
        Self {
            phase: Phase::Routing,
            is_streaming: true,
            accumulated: String::new(),
            routing: None,
        }
    }
}

struct ActiveStream {
    handle: StreamHandle,
    query: String,
}

/// Outcome of pulling one event off the active stream
enum Pull {
    Event(StreamEvent),
    Failed(ClientError),
    Closed,
    Stalled,
}

/// The state machine tying stream, transcript, fallback, and registry together
pub struct StreamingController<S, F, R, P>
where
    S: StreamConsumer,
    F: FallbackClient,
    R: RegistrySync,
    P: StorageProvider,
{
    store: TranscriptStore<P>,
    streams: S,
    fallback: F,
    registry: R,
    state: StreamingState,
    active: Option<ActiveStream>,
    stall_timeout: Option<Duration>,
    /// Most recent agent directory, refreshed after completed turns
    agents: Vec<AgentSummary>,
}

impl<S, F, R, P> StreamingController<S, F, R, P>
where
    S: StreamConsumer,
    F: FallbackClient,
    R: RegistrySync,
    P: StorageProvider,
{
    pub fn new(store: TranscriptStore<P>, streams: S, fallback: F, registry: R) -> Self {
        Self {
            store,
            streams,
            fallback,
            registry,
            state: StreamingState::idle(),
            active: None,
            stall_timeout: None,
            agents: Vec::new(),
        }
    }

    /// Treat a stream that emits nothing for `limit` as a transport failure
    pub fn with_stall_timeout(mut self, limit: Duration) -> Self {
        self.stall_timeout = Some(limit);
        self
    }

    pub fn state(&self) -> &StreamingState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// The transcript in order
    pub fn transcript(&self) -> &[Message] {
        self.store.messages()
    }

    /// Latest known agent directory
    pub fn agents(&self) -> &[AgentSummary] {
        &self.agents
    }

    /// Empty the transcript and its persisted copy
    pub fn clear(&mut self) {
        self.abort();
        self.store.clear();
    }

    /// Submit a query: aborts any active stream, appends the user entry and
    /// the assistant placeholder, then opens the event stream. An open
    /// failure goes straight to the fallback path.
    pub async fn submit(&mut self, query: &str) {
        if self.active.is_some() {
            tracing::debug!("New submit while streaming, aborting previous turn");
            self.abort();
        }

        self.store.append(Message::user(query));
        self.store.append(Message::placeholder());
        self.state = StreamingState::opened();

        match self.streams.open(query).await {
            Ok(handle) => {
                self.active = Some(ActiveStream {
                    handle,
                    query: query.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stream open failed, using fallback");
                self.run_fallback(query).await;
            }
        }
    }

    /// Drive the active stream until the turn finishes
    pub async fn run(&mut self) {
        while self.step().await {}
    }

    /// Process the next stream event to completion. Returns false once the
    /// turn is finished (or no stream is active).
    pub async fn step(&mut self) -> bool {
        let pull = match self.active.as_mut() {
            None => return false,
            Some(active) => {
                let next = active.handle.next_event();
                let pulled = match self.stall_timeout {
                    Some(limit) => match tokio::time::timeout(limit, next).await {
                        Ok(event) => Some(event),
                        Err(_) => None,
                    },
                    None => Some(next.await),
                };
                match pulled {
                    Some(Some(Ok(event))) => Pull::Event(event),
                    Some(Some(Err(e))) => Pull::Failed(e),
                    Some(None) => Pull::Closed,
                    None => Pull::Stalled,
                }
            }
        };

        match pull {
            Pull::Event(event) => self.apply(event).await,
            Pull::Failed(e) if e.kind.triggers_fallback() => {
                tracing::warn!(error = %e, "Stream transport failed, using fallback");
                let query = self.take_active_query();
                self.run_fallback(&query).await;
                false
            }
            Pull::Failed(e) => {
                tracing::warn!(error = %e, kind = ?e.kind, "Stream failed without recovery path");
                let text = e.to_string();
                self.store.update_last(
                    |m| m.streaming,
                    move |m| {
                        m.error = Some(text);
                        m.streaming = false;
                    },
                );
                self.take_active_query();
                self.finish_turn(Phase::Error);
                false
            }
            Pull::Closed => {
                tracing::warn!("Stream closed before completion, using fallback");
                let query = self.take_active_query();
                self.run_fallback(&query).await;
                false
            }
            Pull::Stalled => {
                tracing::warn!("Stream stalled, treating as transport failure");
                let query = self.take_active_query();
                self.run_fallback(&query).await;
                false
            }
        }
    }

    /// Abort the in-flight turn from any state. The placeholder keeps
    /// whatever content accumulated; `streaming` goes false without
    /// fabricating anything, which downstream treats as a cancelled turn.
    pub fn abort(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.abort();
        }
        self.store.update_last(|m| m.streaming, |m| m.streaming = false);
        self.state = StreamingState::idle();
    }

    /// Truncate the transcript from the user entry that preceded the failed
    /// entry and resubmit that query verbatim. Returns false when `failed_id`
    /// or its preceding user entry cannot be found.
    pub async fn retry(&mut self, failed_id: &str) -> bool {
        let messages = self.store.messages();
        let Some(pos) = messages.iter().position(|m| m.id == failed_id) else {
            return false;
        };
        let Some(user) = messages
            .iter()
            .take(pos)
            .rev()
            .find(|m| m.role == Role::User)
        else {
            return false;
        };

        let query = user.content.clone();
        let user_id = user.id.clone();
        self.store.truncate_from(&user_id);
        self.submit(&query).await;
        true
    }

    /// Exhaustive dispatch over the event set. Returns whether the stream is
    /// still live.
    async fn apply(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::RequestReceived => {
                tracing::debug!("Server acknowledged query");
                true
            }
            StreamEvent::RoutingStarted => {
                // Routing is already the phase set at submit; this frame is
                // informational only
                tracing::debug!("Routing started");
                true
            }
            StreamEvent::RoutingCompleted(info) => {
                tracing::debug!(agent = %info.agent_name, "Routing completed");
                // A routing frame arriving after the first chunk must not
                // regress the phase; the snapshot is still captured
                self.state = StreamingState {
                    phase: self.state.phase.max(Phase::Executing),
                    routing: Some(info),
                    ..self.state.clone()
                };
                true
            }
            StreamEvent::AgentExecutionStarted { agent_id } => {
                tracing::debug!(agent_id = %agent_id, "Agent execution started");
                self.state = StreamingState {
                    phase: self.state.phase.max(Phase::Executing),
                    ..self.state.clone()
                };
                true
            }
            StreamEvent::ResponseChunk { text } => {
                let mut accumulated = self.state.accumulated.clone();
                accumulated.push_str(&text);
                self.state = StreamingState {
                    phase: Phase::Streaming,
                    accumulated: accumulated.clone(),
                    ..self.state.clone()
                };
                self.store
                    .update_last(|m| m.streaming, move |m| m.content = accumulated);
                true
            }
            StreamEvent::Completed(payload) => {
                let routing = self.state.routing.clone();
                let resolved_agent = routing
                    .as_ref()
                    .map(|r| r.agent_id.clone())
                    .or_else(|| payload.agent_id.clone());

                self.store.update_last(
                    |m| m.streaming,
                    move |m| {
                        m.streaming = false;
                        // Prefer the routing snapshot; fall back to the
                        // completed payload when routing was never observed
                        match routing {
                            Some(info) => {
                                m.agent_id = Some(info.agent_id);
                                m.agent_name = Some(info.agent_name);
                                m.protocol = info.protocol;
                                m.confidence = info.confidence;
                                m.reasoning = info.reasoning;
                            }
                            None => {
                                m.agent_id = payload.agent_id;
                                m.agent_name = payload.agent_name;
                                m.protocol = payload.protocol;
                                m.confidence = payload.confidence;
                            }
                        }
                    },
                );

                if let Some(active) = self.active.take() {
                    active.handle.abort();
                }
                if resolved_agent.is_some() {
                    self.refresh_registry().await;
                }
                self.finish_turn(Phase::Completed);
                false
            }
            StreamEvent::Error { message } => {
                // The server itself ran and failed; no fallback
                tracing::warn!(error = %message, "Server reported application error");
                self.store.update_last(
                    |m| m.streaming,
                    move |m| {
                        m.error = Some(message);
                        m.streaming = false;
                    },
                );
                if let Some(active) = self.active.take() {
                    active.handle.abort();
                }
                self.finish_turn(Phase::Error);
                false
            }
        }
    }

    /// The single non-streaming attempt; its outcome finalizes the same
    /// placeholder entry the streaming path created.
    async fn run_fallback(&mut self, query: &str) {
        match self.fallback.send(query).await {
            Ok(reply) => {
                self.store.update_last(
                    |m| m.streaming,
                    move |m| {
                        m.content = reply.content;
                        m.agent_id = reply.agent_id;
                        m.agent_name = reply.agent_name;
                        m.protocol = reply.protocol;
                        m.confidence = reply.confidence;
                        m.reasoning = reply.reasoning;
                        m.streaming = false;
                    },
                );
                self.finish_turn(Phase::Completed);
            }
            Err(e) => {
                let text = e.to_string();
                self.store.update_last(
                    |m| m.streaming,
                    move |m| {
                        m.error = Some(text);
                        m.streaming = false;
                    },
                );
                self.finish_turn(Phase::Error);
            }
        }
    }

    /// Best-effort post-completion refresh; failures never touch transcript
    /// or phase state.
    async fn refresh_registry(&mut self) {
        match self.registry.check_health().await {
            Ok(true) => match self.registry.list_agents().await {
                Ok(agents) => {
                    tracing::debug!(count = agents.len(), "Agent directory refreshed");
                    self.agents = agents;
                }
                Err(e) => tracing::warn!(error = %e, "Agent directory refresh failed"),
            },
            Ok(false) => tracing::warn!("Orchestrator unhealthy, skipping agent refresh"),
            Err(e) => tracing::warn!(error = %e, "Health check failed"),
        }
    }

    fn take_active_query(&mut self) -> String {
        self.active
            .take()
            .map(|active| {
                active.handle.abort();
                active.query
            })
            .unwrap_or_default()
    }

    fn finish_turn(&mut self, terminal: Phase) {
        tracing::debug!(phase = ?terminal, "Turn finished");
        self.state = StreamingState::idle();
    }
}
