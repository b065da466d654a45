//! Client error types

use thiserror::Error;

/// Client error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Application, message)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Persistence, message)
    }
}

/// Error classification
///
/// The classification decides the recovery policy: transport failures before
/// stream completion trigger the single fallback attempt, protocol failures
/// drop the offending frame and continue, application failures finalize the
/// in-flight entry without fallback, persistence failures are logged and
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Stream could not be opened or broke before completion
    Transport,
    /// An individual frame failed to parse
    Protocol,
    /// The server ran the request and reported a failure
    Application,
    /// Storage read/write failure
    Persistence,
}

impl ErrorKind {
    /// Whether this failure routes through the fallback path
    pub fn triggers_fallback(&self) -> bool {
        matches!(self, Self::Transport)
    }
}
