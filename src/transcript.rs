//! Transcript: the ordered, append-only message sequence
//!
//! The store owns the conversation transcript and its single mutable
//! "in-flight" slot (the last entry while it is still streaming). Every
//! mutation triggers a best-effort persistence write; storage failures are
//! logged and never surfaced to callers.

mod storage;

pub use storage::{FileStorage, MemoryStorage, StorageProvider, TRANSCRIPT_KEY};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    /// Accumulated text; mutable only while `streaming` is true and only for
    /// the last entry
    pub content: String,
    /// True only for the single currently-open assistant entry
    #[serde(default)]
    pub streaming: bool,
    /// Failure text; mutually exclusive with normal content display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// A user entry carrying the submitted query text
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: text.into(),
            streaming: false,
            error: None,
            agent_id: None,
            agent_name: None,
            protocol: None,
            confidence: None,
            reasoning: None,
            timestamp: Utc::now(),
        }
    }

    /// The empty assistant placeholder appended at submit time and filled in
    /// as stream events arrive
    pub fn placeholder() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: String::new(),
            streaming: true,
            error: None,
            agent_id: None,
            agent_name: None,
            protocol: None,
            confidence: None,
            reasoning: None,
            timestamp: Utc::now(),
        }
    }
}

/// The ordered, append-only message sequence with best-effort persistence
pub struct TranscriptStore<P: StorageProvider> {
    messages: Vec<Message>,
    storage: P,
}

impl<P: StorageProvider> TranscriptStore<P> {
    /// Create a store backed by `storage`, loading any previously persisted
    /// transcript. Load failures are logged and yield an empty transcript.
    pub fn new(storage: P) -> Self {
        let messages = match storage.get(TRANSCRIPT_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Message>>(&raw) {
                Ok(messages) => {
                    tracing::debug!(count = messages.len(), "Restored persisted transcript");
                    messages
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Persisted transcript unreadable, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load persisted transcript");
                Vec::new()
            }
        };

        Self { messages, storage }
    }

    /// All entries in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent entry, if any
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Add an entry at the end
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.persist();
    }

    /// Apply `patch` to the last entry only if `predicate` holds for it.
    /// Returns whether the patch was applied.
    pub fn update_last(
        &mut self,
        predicate: impl FnOnce(&Message) -> bool,
        patch: impl FnOnce(&mut Message),
    ) -> bool {
        let Some(last) = self.messages.last_mut() else {
            return false;
        };
        if !predicate(last) {
            return false;
        }
        patch(last);
        self.persist();
        true
    }

    /// Empty the transcript and erase persisted storage
    pub fn clear(&mut self) {
        self.messages.clear();
        if let Err(e) = self.storage.clear(TRANSCRIPT_KEY) {
            tracing::warn!(error = %e, "Failed to clear persisted transcript");
        }
    }

    /// Remove the entry with `id` and everything after it. No-op when `id`
    /// is not present.
    pub fn truncate_from(&mut self, id: &str) {
        if let Some(pos) = self.messages.iter().position(|m| m.id == id) {
            self.messages.truncate(pos);
            self.persist();
        }
    }

    /// Fire-and-forget persistence of the current transcript
    fn persist(&self) {
        let serialized = match serde_json::to_string(&self.messages) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize transcript");
                return;
            }
        };
        if let Err(e) = self.storage.set(TRANSCRIPT_KEY, &serialized) {
            tracing::warn!(error = %e, "Failed to persist transcript");
        }
    }
}
