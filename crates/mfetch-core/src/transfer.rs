//! Streaming downloader: one URL to one target path, reporting every state
//! transition to a [`ProgressSink`].
//!
//! The curl transfer runs on a blocking thread and hands 1 MiB chunks to the
//! async side through a small bounded channel; the async side writes them to
//! the target file and reports progress. Backpressure flows from the sink all
//! the way back to the socket read. If the sink reports that its consumer is
//! gone, the transfer stops and the partial file is removed exactly as for
//! any other failure.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::http::{self, FetchError, FetchOptions, ResponseHead};

/// Chunks buffered between the curl thread and the writer.
const CHUNK_QUEUE_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Start,
    Progress,
    Completed,
    Error,
    AlreadyExists,
}

impl TransferPhase {
    /// `Completed`, `Error` and `AlreadyExists` end a transfer.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferPhase::Completed | TransferPhase::Error | TransferPhase::AlreadyExists
        )
    }
}

/// Snapshot of one transfer. `bytes_downloaded` only grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    pub phase: TransferPhase,
    pub bytes_downloaded: u64,
    /// Upstream `Content-Length`; `None` means unknown, not zero.
    pub total_bytes: Option<u64>,
    pub path: String,
    pub message: Option<String>,
}

impl TransferState {
    fn new(path: &Path) -> Self {
        Self {
            phase: TransferPhase::Start,
            bytes_downloaded: 0,
            total_bytes: None,
            path: path.display().to_string(),
            message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// The peer that consumes progress went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("progress channel closed")]
pub struct SinkClosed;

/// Receives transfer states in production order.
pub trait ProgressSink: Send {
    /// Delivers one state. An error means nobody is listening any more; the
    /// downloader treats it like an I/O failure.
    fn emit(&mut self, state: &TransferState)
        -> impl Future<Output = Result<(), SinkClosed>> + Send;
}

/// Collects states in memory; used by tests and callers that only want the log.
impl ProgressSink for Vec<TransferState> {
    async fn emit(&mut self, state: &TransferState) -> Result<(), SinkClosed> {
        self.push(state.clone());
        Ok(())
    }
}

impl ProgressSink for mpsc::Sender<TransferState> {
    async fn emit(&mut self, state: &TransferState) -> Result<(), SinkClosed> {
        self.send(state.clone()).await.map_err(|_| SinkClosed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error(transparent)]
    Upstream(#[from] FetchError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Emit(#[from] SinkClosed),
    #[error("transfer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

enum FetchEvent {
    Head(ResponseHead),
    Chunk(Vec<u8>),
}

/// Streams URLs to disk. Cheap to clone; holds only options.
#[derive(Debug, Clone, Default)]
pub struct StreamingDownloader {
    options: FetchOptions,
}

impl StreamingDownloader {
    pub fn new(options: FetchOptions) -> Self {
        Self { options }
    }

    /// Downloads `url` to `target`, emitting `Start`, `Progress`* and exactly
    /// one terminal state to `sink`. Returns the terminal state.
    ///
    /// An existing `target` short-circuits to `AlreadyExists` without network
    /// I/O. On failure the partially written target is removed (only if this
    /// call created it) before `Error` is emitted.
    pub async fn stream<S: ProgressSink>(
        &self,
        url: &str,
        target: &Path,
        sink: &mut S,
    ) -> TransferState {
        let mut state = TransferState::new(target);

        if tokio::fs::try_exists(target).await.unwrap_or(false) {
            state.phase = TransferPhase::AlreadyExists;
            let _ = sink.emit(&state).await;
            return state;
        }

        let mut created = false;
        let mut outcome = self
            .run_transfer(url, target, &mut state, &mut created, sink)
            .await;
        if outcome.is_ok() {
            state.phase = TransferPhase::Completed;
            outcome = sink.emit(&state).await.map_err(TransferError::from);
        }

        match outcome {
            Ok(()) => {
                tracing::info!(bytes = state.bytes_downloaded, "Saved to {}", target.display());
            }
            Err(err) => {
                if created {
                    remove_partial(target).await;
                }
                tracing::error!("Failed to download model from {}: {}", url, err);
                state.phase = TransferPhase::Error;
                state.message = Some(err.to_string());
                let _ = sink.emit(&state).await;
            }
        }
        state
    }

    async fn run_transfer<S: ProgressSink>(
        &self,
        url: &str,
        target: &Path,
        state: &mut TransferState,
        created: &mut bool,
        sink: &mut S,
    ) -> Result<(), TransferError> {
        let (tx, mut rx) = mpsc::channel::<FetchEvent>(CHUNK_QUEUE_DEPTH);
        let opts = self.options;
        let url_owned = url.to_string();
        let fetch_task = tokio::task::spawn_blocking(move || {
            let head_tx = tx.clone();
            http::fetch(
                &url_owned,
                &opts,
                |head| head_tx.blocking_send(FetchEvent::Head(head)).is_ok(),
                |chunk| tx.blocking_send(FetchEvent::Chunk(chunk)).is_ok(),
            )
        });

        let mut file: Option<tokio::fs::File> = None;
        while let Some(event) = rx.recv().await {
            match event {
                FetchEvent::Head(head) => {
                    file = Some(begin(target, head.content_length, state, created, sink).await?);
                }
                FetchEvent::Chunk(chunk) => {
                    if file.is_none() {
                        file = Some(begin(target, None, state, created, sink).await?);
                    }
                    if let Some(f) = file.as_mut() {
                        f.write_all(&chunk).await.map_err(|e| io_err(target, e))?;
                    }
                    state.phase = TransferPhase::Progress;
                    state.bytes_downloaded += chunk.len() as u64;
                    sink.emit(state).await?;
                }
            }
        }

        fetch_task.await??;

        let mut f = match file {
            Some(f) => f,
            None => begin(target, None, state, created, sink).await?,
        };
        f.flush().await.map_err(|e| io_err(target, e))?;
        Ok(())
    }
}

/// Emits `Start`, then creates parent directories and the target file.
/// The file is opened with `create_new`, so a concurrent download of the
/// same target fails here instead of interleaving bytes.
async fn begin<S: ProgressSink>(
    target: &Path,
    total: Option<u64>,
    state: &mut TransferState,
    created: &mut bool,
    sink: &mut S,
) -> Result<tokio::fs::File, TransferError> {
    state.phase = TransferPhase::Start;
    state.total_bytes = total;
    sink.emit(state).await?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .await
        .map_err(|e| io_err(target, e))?;
    *created = true;
    Ok(file)
}

fn io_err(path: &Path, source: std::io::Error) -> TransferError {
    TransferError::Io {
        path: path.to_path_buf(),
        source,
    }
}

async fn remove_partial(target: &Path) {
    match tokio::fs::remove_file(target).await {
        Ok(()) => tracing::debug!(path = %target.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %target.display(), "could not remove partial download: {}", e)
        }
    }
}
