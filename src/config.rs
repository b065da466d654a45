//! Environment-driven configuration

use std::path::PathBuf;
use std::time::Duration;

/// Default orchestrator endpoint when `SWITCHBOARD_BASE_URL` is unset
const DEFAULT_BASE_URL: &str = "http://localhost:8100";

/// Per-request HTTP timeout default (seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the orchestration service
    pub base_url: String,
    /// Directory for the persisted transcript
    pub storage_dir: PathBuf,
    /// HTTP request timeout (applies to fallback and registry calls; the
    /// streaming request is bounded by the stall timeout instead)
    pub request_timeout: Duration,
    /// How long the controller waits between stream frames before treating
    /// the stream as broken. `None` means wait indefinitely.
    pub stall_timeout: Option<Duration>,
}

impl Config {
    /// Build configuration from `SWITCHBOARD_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let base_url = std::env::var("SWITCHBOARD_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let storage_dir = std::env::var("SWITCHBOARD_STORAGE_DIR")
            .map_or_else(
                |_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                    PathBuf::from(home).join(".switchboard")
                },
                PathBuf::from,
            );

        let request_timeout = std::env::var("SWITCHBOARD_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);

        let stall_timeout = std::env::var("SWITCHBOARD_STALL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs);

        Self {
            base_url,
            storage_dir,
            request_timeout,
            stall_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            storage_dir: PathBuf::from("/tmp/.switchboard"),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            stall_timeout: None,
        }
    }
}
