//! Tests for serve and catalog.

use super::parse;
use crate::cli::CliCommand;

#[test]
fn cli_parse_serve_default() {
    match parse(&["mfetch", "serve"]) {
        CliCommand::Serve { bind } => assert!(bind.is_none()),
        _ => panic!("expected Serve"),
    }
}

#[test]
fn cli_parse_serve_bind() {
    match parse(&["mfetch", "serve", "--bind", "0.0.0.0:9000"]) {
        CliCommand::Serve { bind } => assert_eq!(bind.as_deref(), Some("0.0.0.0:9000")),
        _ => panic!("expected Serve with --bind"),
    }
}

#[test]
fn cli_parse_catalog() {
    match parse(&["mfetch", "catalog"]) {
        CliCommand::Catalog => {}
        _ => panic!("expected Catalog"),
    }
}
