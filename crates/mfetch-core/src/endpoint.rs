//! `POST /internal/download_model`: validate, resolve, then stream progress.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{post, MethodRouter};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::MfetchConfig;
use crate::emitter::{ProgressEmitter, WireEvent, JSONL_CONTENT_TYPE, RESPONSE_QUEUE_DEPTH};
use crate::http::FetchOptions;
use crate::resolve::AllowedRootSet;
use crate::transfer::StreamingDownloader;

const MISSING_PARAMETERS: &str = "Missing required parameters";

/// Request body. Empty strings count as missing.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadModelRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
}

fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Shared state of the endpoint.
pub struct DownloadService {
    roots: AllowedRootSet,
    downloader: StreamingDownloader,
}

impl DownloadService {
    pub fn new(roots: AllowedRootSet, downloader: StreamingDownloader) -> Self {
        Self { roots, downloader }
    }

    pub fn from_config(cfg: &MfetchConfig) -> std::io::Result<Self> {
        Ok(Self::new(
            AllowedRootSet::new(&cfg.roots)?,
            StreamingDownloader::new(FetchOptions::streaming(cfg)),
        ))
    }

    pub fn roots(&self) -> &AllowedRootSet {
        &self.roots
    }
}

/// Method router to install at the endpoint path.
pub fn route(service: Arc<DownloadService>) -> MethodRouter {
    post(download_model).with_state(service)
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

pub async fn download_model(
    State(service): State<Arc<DownloadService>>,
    payload: Result<Json<DownloadModelRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        return bad_request(MISSING_PARAMETERS);
    };
    let (Some(url), Some(directory), Some(filename)) = (
        required(&req.url),
        required(&req.directory),
        required(&req.filename),
    ) else {
        return bad_request(MISSING_PARAMETERS);
    };

    // Normalization reads symlinks from disk.
    let resolved = {
        let service = Arc::clone(&service);
        let (directory, filename) = (directory.to_string(), filename.to_string());
        let destination = req.destination.clone();
        tokio::task::spawn_blocking(move || {
            service
                .roots
                .resolve(&directory, &filename, destination.as_deref())
        })
        .await
    };
    let target = match resolved {
        Ok(Ok(t)) => t,
        Ok(Err(e)) => {
            tracing::warn!(directory, "rejected download request: {}", e);
            return bad_request(e.to_string());
        }
        Err(e) => {
            tracing::error!("path resolution task failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "path resolution failed" })),
            )
                .into_response();
        }
    };

    if tokio::fs::try_exists(&target.full_path).await.unwrap_or(false) {
        tracing::info!("{} already exists; skipping download", target.full_path.display());
        return Json(WireEvent::Exists {
            path: target.full_path.display().to_string(),
        })
        .into_response();
    }

    tracing::info!(url, path = %target.full_path.display(), "starting model download");
    let (tx, rx) = mpsc::channel(RESPONSE_QUEUE_DEPTH);
    let downloader = service.downloader.clone();
    let url = url.to_string();
    tokio::spawn(async move {
        let mut emitter = ProgressEmitter::new(tx);
        downloader.stream(&url, &target.full_path, &mut emitter).await;
        emitter.close();
    });

    (
        [(header::CONTENT_TYPE, JSONL_CONTENT_TYPE)],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}
