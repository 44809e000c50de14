//! Wire encoding of transfer states: one JSON object per line.
//!
//! ```text
//! {"status":"start","total":1048576,"path":"/models/checkpoints/model.bin"}
//! {"status":"progress","downloaded":1048576,"total":1048576}
//! {"status":"completed","path":"/models/checkpoints/model.bin"}
//! ```
//!
//! Records go out in production order, one frame per record, so a client
//! sees progress as it happens. Dropping the emitter ends the response body.

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::transfer::{ProgressSink, SinkClosed, TransferPhase, TransferState};

/// Content type of the streamed response.
pub const JSONL_CONTENT_TYPE: &str = "application/jsonl; charset=utf-8";

/// Response frames buffered before a slow client pushes back on the download.
pub const RESPONSE_QUEUE_DEPTH: usize = 4;

/// One line of the progress protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WireEvent {
    Start { total: Option<u64>, path: String },
    Progress { downloaded: u64, total: Option<u64> },
    Completed { path: String },
    Error { message: String },
    Exists { path: String },
}

impl From<&TransferState> for WireEvent {
    fn from(state: &TransferState) -> Self {
        match state.phase {
            TransferPhase::Start => WireEvent::Start {
                total: state.total_bytes,
                path: state.path.clone(),
            },
            TransferPhase::Progress => WireEvent::Progress {
                downloaded: state.bytes_downloaded,
                total: state.total_bytes,
            },
            TransferPhase::Completed => WireEvent::Completed {
                path: state.path.clone(),
            },
            TransferPhase::Error => WireEvent::Error {
                message: state
                    .message
                    .clone()
                    .unwrap_or_else(|| "download failed".to_string()),
            },
            TransferPhase::AlreadyExists => WireEvent::Exists {
                path: state.path.clone(),
            },
        }
    }
}

impl WireEvent {
    /// Serialized record including the trailing newline.
    pub fn to_line(&self) -> Bytes {
        // Serializing plain strings and integers cannot fail.
        let mut line = serde_json::to_vec(self).unwrap_or_default();
        line.push(b'\n');
        Bytes::from(line)
    }
}

/// Body channel of a streamed response: frames in, `Body::from_stream` out.
pub type ResponseChannel = mpsc::Sender<Result<Bytes, std::io::Error>>;

/// Writes progress records onto an established response channel.
pub struct ProgressEmitter {
    channel: ResponseChannel,
}

impl ProgressEmitter {
    pub fn new(channel: ResponseChannel) -> Self {
        Self { channel }
    }

    /// Writes one record. Fails fast once the client has disconnected and the
    /// body receiver is gone.
    pub async fn emit(&mut self, state: &TransferState) -> Result<(), SinkClosed> {
        let line = WireEvent::from(state).to_line();
        self.channel.send(Ok(line)).await.map_err(|_| SinkClosed)
    }

    /// Signals end of stream. Dropping the emitter has the same effect, which
    /// also covers early returns and panics in the driving task.
    pub fn close(self) {
        drop(self.channel);
    }
}

impl ProgressSink for ProgressEmitter {
    async fn emit(&mut self, state: &TransferState) -> Result<(), SinkClosed> {
        ProgressEmitter::emit(self, state).await
    }
}
