//! Integration tests: blocking download with temp file and atomic rename.

mod common;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use common::http_server::{self, ServerOptions};
use mfetch_core::direct::{DirectDownloader, DirectError, DirectRequest, DirectoryCatalog};
use mfetch_core::http::{FetchError, FetchOptions};
use mfetch_core::staging::temp_path;
use tempfile::{tempdir, TempDir};

/// Catalog with `<tmp>/checkpoints` and `<tmp>/vae` configured; the root label
/// is `<tmp>` itself.
fn setup() -> (TempDir, DirectDownloader, String) {
    let dir = tempdir().unwrap();
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    categories.insert("checkpoints".into(), vec![dir.path().join("checkpoints")]);
    categories.insert("vae".into(), vec![dir.path().join("vae")]);
    let downloader = DirectDownloader::new(
        Arc::new(DirectoryCatalog::new(categories)),
        FetchOptions {
            chunk_size: 4096,
            ..FetchOptions::default()
        },
    );
    let label = dir.path().display().to_string();
    (dir, downloader, label)
}

fn request(url: String, models_path: &str, model_type: &str) -> DirectRequest {
    DirectRequest {
        url,
        models_path: models_path.to_string(),
        model_type: model_type.to_string(),
        ..DirectRequest::default()
    }
}

fn no_progress(_: u64, _: Option<u64>) {}

#[test]
fn downloads_and_renames_into_place() {
    let data: Vec<u8> = (0u8..255).cycle().take(10_000).collect();
    let server = http_server::start(data.clone());
    let (dir, downloader, label) = setup();

    let mut seen = Vec::new();
    let path = downloader
        .download(
            &request(server.url("files/sd15.ckpt?download=1"), &label, " checkpoints "),
            |done, total| seen.push((done, total)),
        )
        .unwrap();

    let expected = dir.path().join("checkpoints").join("sd15.ckpt");
    assert_eq!(path, expected);
    assert_eq!(std::fs::read(&path).unwrap(), data);
    assert!(!temp_path(&path).exists());
    assert_eq!(
        seen,
        [
            (4096, Some(10_000)),
            (8192, Some(10_000)),
            (10_000, Some(10_000))
        ]
    );
}

#[test]
fn existing_file_without_overwrite_is_untouched() {
    let server = http_server::start(b"new".to_vec());
    let (dir, downloader, label) = setup();
    let existing = dir.path().join("vae").join("v.pt");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, b"old").unwrap();

    let path = downloader
        .download(&request(server.url("v.pt"), &label, "vae"), no_progress)
        .unwrap();
    assert_eq!(path, existing);
    assert_eq!(std::fs::read(&existing).unwrap(), b"old");
    assert_eq!(server.get_count(), 0);
}

#[test]
fn overwrite_replaces_via_rename() {
    let server = http_server::start(b"new".to_vec());
    let (dir, downloader, label) = setup();
    let existing = dir.path().join("vae").join("v.pt");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, b"old").unwrap();

    let req = DirectRequest {
        overwrite: true,
        ..request(server.url("v.pt"), &label, "vae")
    };
    let path = downloader.download(&req, no_progress).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"new");
    assert_eq!(server.get_count(), 1);
}

#[test]
fn explicit_filename_is_reduced_to_basename() {
    let server = http_server::start(b"data".to_vec());
    let (dir, downloader, label) = setup();
    let req = DirectRequest {
        filename: Some("../../escape.bin".into()),
        ..request(server.url("x"), &label, "checkpoints")
    };
    let path = downloader.download(&req, no_progress).unwrap();
    assert_eq!(path, dir.path().join("checkpoints").join("escape.bin"));
}

#[test]
fn mid_transfer_failure_leaves_nothing_behind() {
    let server = http_server::start_with_options(
        vec![7u8; 20_000],
        ServerOptions {
            truncate_after: Some(9_000),
            ..ServerOptions::default()
        },
    );
    let (dir, downloader, label) = setup();
    let final_path = dir.path().join("checkpoints").join("broken.bin");

    let mut calls = 0;
    let err = downloader
        .download(
            &request(server.url("broken.bin"), &label, "checkpoints"),
            |_, _| calls += 1,
        )
        .unwrap_err();

    assert!(matches!(err, DirectError::Download { .. }), "{err}");
    assert!(err.to_string().starts_with("Failed to download "));
    assert!(calls > 0, "some chunks were written before the failure");
    assert!(!final_path.exists());
    assert!(!temp_path(&final_path).exists());
}

#[test]
fn http_error_is_a_hard_failure() {
    let server = http_server::start_with_options(
        Vec::new(),
        ServerOptions {
            status: "500 Internal Server Error",
            ..ServerOptions::default()
        },
    );
    let (dir, downloader, label) = setup();
    let err = downloader
        .download(&request(server.url("m.bin"), &label, "checkpoints"), no_progress)
        .unwrap_err();
    assert!(err.to_string().contains("500"), "{err}");
    let DirectError::Download { source, .. } = &err else {
        panic!("expected Download, got {err:?}");
    };
    assert_eq!(
        source.downcast_ref::<FetchError>().and_then(FetchError::status),
        Some(500)
    );
    let final_path = dir.path().join("checkpoints").join("m.bin");
    assert!(!final_path.exists());
    assert!(!temp_path(&final_path).exists());
}

#[test]
fn validation_errors() {
    let (_dir, downloader, label) = setup();

    let err = downloader
        .download(&request("  ".into(), &label, "checkpoints"), no_progress)
        .unwrap_err();
    assert!(matches!(err, DirectError::EmptyUrl));

    let err = downloader
        .download(&request("http://h/m".into(), "/nowhere", "checkpoints"), no_progress)
        .unwrap_err();
    assert!(matches!(err, DirectError::UnknownModelsPath(p) if p == "/nowhere"));

    let err = downloader
        .download(&request("http://h/m".into(), &label, "   "), no_progress)
        .unwrap_err();
    assert!(matches!(err, DirectError::MissingModelType));

    let err = downloader
        .download(&request("http://h/m".into(), &label, "loras"), no_progress)
        .unwrap_err();
    assert!(matches!(err, DirectError::UnknownModelType { .. }));

    let err = downloader
        .download(&request("http://h/m".into(), &label, "../checkpoints"), no_progress)
        .unwrap_err();
    assert!(matches!(err, DirectError::InvalidModelType(_)));

    let err = downloader
        .download(&request("http://h/".into(), &label, "checkpoints"), no_progress)
        .unwrap_err();
    assert!(matches!(err, DirectError::NoFilename));
}

#[test]
fn catalog_lists_tmp_root() {
    let (dir, downloader, label) = setup();
    let choices = downloader.catalog().choices().unwrap();
    assert_eq!(choices.models_paths, [label.clone()]);
    assert_eq!(choices.model_types, ["checkpoints", "vae"]);
    assert_eq!(choices.default_model_type, "checkpoints");
    assert_eq!(
        downloader.catalog().root(&label).unwrap().unwrap().path,
        dir.path().to_path_buf()
    );
}
