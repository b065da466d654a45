//! Stream consumption: opening the orchestrator's event stream and parsing
//! its framed records
//!
//! The HTTP consumer POSTs the query and reads the SSE response body. A
//! background task turns raw bytes into [`StreamEvent`]s and hands them over
//! a channel in exact arrival order; frames that fail to parse are dropped
//! with a warning and never terminate the stream.

mod event;

pub use event::{CompletedPayload, RoutingInfo, StreamEvent};

use crate::config::Config;
use crate::error::ClientError;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Opens a live event stream for a query
#[async_trait]
pub trait StreamConsumer: Send + Sync {
    async fn open(&self, query: &str) -> Result<StreamHandle, ClientError>;
}

#[async_trait]
impl<T: StreamConsumer + ?Sized> StreamConsumer for std::sync::Arc<T> {
    async fn open(&self, query: &str) -> Result<StreamHandle, ClientError> {
        (**self).open(query).await
    }
}

/// Handle to an open stream: events are pulled one at a time, and the
/// underlying transport can be aborted
pub struct StreamHandle {
    events: mpsc::Receiver<Result<StreamEvent, ClientError>>,
    cancel: CancellationToken,
}

impl StreamHandle {
    pub fn new(
        events: mpsc::Receiver<Result<StreamEvent, ClientError>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { events, cancel }
    }

    /// Next event in arrival order. `None` means the stream ended or was
    /// aborted; frames buffered before an abort are discarded rather than
    /// delivered.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, ClientError>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let event = self.events.recv().await;
        if self.cancel.is_cancelled() {
            return None;
        }
        event
    }

    /// Close the underlying transport. Idempotent; after this returns,
    /// `next_event` yields `None`.
    pub fn abort(&self) {
        self.cancel.cancel();
    }
}

/// SSE-over-HTTP stream consumer
pub struct HttpStreamConsumer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStreamConsumer {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            endpoint: format!("{}/query/stream", config.base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl StreamConsumer for HttpStreamConsumer {
    async fn open(&self, query: &str) -> Result<StreamHandle, ClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("Failed to open stream: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::transport(format!(
                "Stream request rejected: HTTP {status}: {body}"
            )));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let reader_cancel = cancel.clone();
        let body = Box::pin(response.bytes_stream());

        tokio::spawn(async move {
            read_frames(body, tx, reader_cancel).await;
        });

        Ok(StreamHandle::new(rx, cancel))
    }
}

/// Read loop: raw bytes -> lines -> frames -> channel. Exits on cancellation,
/// transport error, natural end of stream, or a dropped receiver.
async fn read_frames(
    mut body: impl futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin,
    tx: mpsc::Sender<Result<StreamEvent, ClientError>>,
    cancel: CancellationToken,
) {
    let mut buffer = String::new();
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("Stream reader cancelled");
                return;
            }
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    while let Some(line) = take_line(&mut buffer) {
                        if let Some(event) = decode_frame(&line) {
                            if tx.send(Ok(event)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    let _ = tx
                        .send(Err(ClientError::transport(format!("Stream read failed: {e}"))))
                        .await;
                    return;
                }
                // Natural end; the closed channel signals it downstream
                None => return,
            }
        }
    }
}

/// Pop one complete line off the front of `buffer`, stripping the newline.
/// Returns `None` while the buffer holds only a partial line.
fn take_line(buffer: &mut String) -> Option<String> {
    let pos = buffer.find('\n')?;
    let line: String = buffer.drain(..=pos).collect();
    Some(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Decode one SSE line into an event. Non-data lines (comments, field lines,
/// blank separators) yield `None`; malformed data frames are dropped with a
/// warning.
fn decode_frame(line: &str) -> Option<StreamEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str(data) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, frame = %data, "Dropping unparseable stream frame");
            None
        }
    }
}
