//! Switchboard client core
//!
//! A conversational client for an agent-orchestration service. The heart of
//! the crate is the streaming response reconciliation core: a state machine
//! that consumes the orchestrator's incremental, multi-phase event stream
//! (routing, execution, chunked response text) and reconciles it into an
//! append-only transcript with at most one in-flight entry, deterministic
//! ordering, and a single non-streaming fallback attempt when the stream
//! path fails before completion.
//!
//! Rendering and transport wiring live elsewhere; this crate owns the state.

pub mod config;
pub mod controller;
pub mod error;
pub mod fallback;
pub mod registry;
pub mod stream;
pub mod transcript;

pub use config::Config;
pub use controller::{Phase, StreamingController, StreamingState};
pub use error::{ClientError, ErrorKind};
pub use fallback::{FallbackClient, FallbackReply, HttpFallbackClient};
pub use registry::{AgentSummary, HttpRegistryClient, RegistrySync};
pub use stream::{
    CompletedPayload, HttpStreamConsumer, RoutingInfo, StreamConsumer, StreamEvent, StreamHandle,
};
pub use transcript::{
    FileStorage, MemoryStorage, Message, Role, StorageProvider, TranscriptStore,
};

use std::sync::Arc;

/// Production controller wired against the HTTP orchestrator endpoints and
/// file-backed transcript storage
pub type ProductionController = StreamingController<
    Arc<HttpStreamConsumer>,
    Arc<HttpFallbackClient>,
    Arc<HttpRegistryClient>,
    FileStorage,
>;

/// Build the production controller from configuration. Fails only when the
/// storage directory cannot be created.
pub fn build_controller(config: &Config) -> Result<ProductionController, ClientError> {
    let storage = FileStorage::open(&config.storage_dir)?;
    let store = TranscriptStore::new(storage);
    let controller = StreamingController::new(
        store,
        Arc::new(HttpStreamConsumer::new(config)),
        Arc::new(HttpFallbackClient::new(config)),
        Arc::new(HttpRegistryClient::new(config)),
    );
    Ok(match config.stall_timeout {
        Some(limit) => controller.with_stall_timeout(limit),
        None => controller,
    })
}
