//! Blocking download into `<root>/<model_type>/<filename>`.
//!
//! Used by callers that want a finished file rather than a progress stream.
//! The body goes to a `.download` sibling and is renamed onto the final name
//! only after the whole transfer succeeded; any failure removes the temp file
//! and is returned to the caller.

mod catalog;

pub use catalog::{DirectoryCatalog, ModelRoot, NodeChoices};

use std::cell::Cell;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::MfetchConfig;
use crate::http::{self, FetchOptions};
use crate::staging::StagedFile;
use crate::url_model::{base_name, choose_filename};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum DirectError {
    #[error("URL must not be empty")]
    EmptyUrl,
    #[error("Unknown models path selection: {0}")]
    UnknownModelsPath(String),
    #[error("Model type must be provided")]
    MissingModelType,
    #[error("Model type '{model_type}' not recognised for models path '{models_path}'")]
    UnknownModelType {
        model_type: String,
        models_path: String,
    },
    #[error("Model type '{0}' must be a single directory name")]
    InvalidModelType(String),
    #[error("Unable to determine filename from URL; please provide one explicitly")]
    NoFilename,
    #[error("No model paths discovered in folder configuration")]
    NoModelPaths,
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: BoxError,
    },
}

/// Inputs of one blocking download.
#[derive(Debug, Clone, Default)]
pub struct DirectRequest {
    pub url: String,
    /// A root label from [`DirectoryCatalog::choices`].
    pub models_path: String,
    pub model_type: String,
    /// Derived from the URL's last path segment when absent or blank.
    pub filename: Option<String>,
    pub overwrite: bool,
}

pub struct DirectDownloader {
    catalog: Arc<DirectoryCatalog>,
    options: FetchOptions,
}

impl DirectDownloader {
    pub fn new(catalog: Arc<DirectoryCatalog>, options: FetchOptions) -> Self {
        Self { catalog, options }
    }

    pub fn from_config(cfg: &MfetchConfig) -> Self {
        Self::new(
            Arc::new(DirectoryCatalog::new(cfg.roots.clone())),
            FetchOptions::blocking(cfg),
        )
    }

    pub fn catalog(&self) -> &DirectoryCatalog {
        &self.catalog
    }

    /// Downloads `req.url` and returns the final path.
    ///
    /// An existing destination is returned untouched (no network I/O) unless
    /// `req.overwrite` is set. `progress` receives `(downloaded, total)` after
    /// every chunk written.
    pub fn download<P>(&self, req: &DirectRequest, mut progress: P) -> Result<PathBuf, DirectError>
    where
        P: FnMut(u64, Option<u64>),
    {
        let url = req.url.trim();
        if url.is_empty() {
            return Err(DirectError::EmptyUrl);
        }

        let root = self
            .catalog
            .root(&req.models_path)?
            .ok_or_else(|| DirectError::UnknownModelsPath(req.models_path.clone()))?;

        let model_type = req.model_type.trim();
        if model_type.is_empty() {
            return Err(DirectError::MissingModelType);
        }
        if base_name(model_type).as_deref() != Some(model_type) {
            return Err(DirectError::InvalidModelType(model_type.to_string()));
        }
        if !root.model_types.is_empty() && !root.model_types.iter().any(|t| t == model_type) {
            return Err(DirectError::UnknownModelType {
                model_type: model_type.to_string(),
                models_path: req.models_path.clone(),
            });
        }

        let dest_dir = root.path.join(model_type);
        std::fs::create_dir_all(&dest_dir).map_err(|source| DirectError::Io {
            path: dest_dir.clone(),
            source,
        })?;

        let filename =
            choose_filename(req.filename.as_deref(), url).ok_or(DirectError::NoFilename)?;
        let destination = dest_dir.join(filename);
        if destination.exists() && !req.overwrite {
            tracing::info!("Model already exists at {}; skipping download", destination.display());
            return Ok(destination);
        }

        let mut staged = StagedFile::create(&destination).map_err(|source| DirectError::Io {
            path: destination.clone(),
            source,
        })?;

        tracing::info!("Downloading {} to {}", url, destination.display());
        let total = Cell::new(None);
        let mut write_error: Option<std::io::Error> = None;
        let fetched = http::fetch(
            url,
            &self.options,
            |head| {
                total.set(head.content_length);
                true
            },
            |chunk| match staged.append(&chunk) {
                Ok(()) => {
                    progress(staged.written(), total.get());
                    true
                }
                Err(e) => {
                    write_error = Some(e);
                    false
                }
            },
        );

        if let Err(fetch_err) = fetched {
            let source: BoxError = match write_error {
                Some(io) => Box::new(io),
                None => Box::new(fetch_err),
            };
            let err = DirectError::Download {
                url: url.to_string(),
                source,
            };
            tracing::error!("{}", err);
            // Dropping `staged` removes the temp file.
            return Err(err);
        }

        let saved = staged.commit().map_err(|source| DirectError::Io {
            path: destination.clone(),
            source,
        })?;
        tracing::info!("Saved model to {}", saved.display());
        Ok(saved)
    }
}
