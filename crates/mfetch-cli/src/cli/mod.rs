//! CLI for mfetch.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mfetch_core::config;

use commands::{run_catalog, run_fetch, run_serve, FetchArgs};

/// Top-level CLI for mfetch.
#[derive(Debug, Parser)]
#[command(name = "mfetch")]
#[command(about = "mfetch: model downloader with a streaming HTTP endpoint", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the host HTTP server with the download endpoint installed.
    Serve {
        /// Listen address (overrides `bind_addr` from the config file).
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Download one model into <MODELS_PATH>/<MODEL_TYPE>/ and print its path.
    Fetch {
        /// Direct HTTP/HTTPS URL to download.
        url: String,
        /// Root label, as listed by `mfetch catalog`.
        #[arg(long, value_name = "ROOT")]
        models_path: String,
        /// Model type directory under the root (e.g. checkpoints).
        #[arg(long, value_name = "TYPE")]
        model_type: String,
        /// File name to save as (default: last URL path segment).
        #[arg(long)]
        filename: Option<String>,
        /// Replace an existing file instead of returning it unchanged.
        #[arg(long)]
        overwrite: bool,
    },

    /// List discovered model roots and model types.
    Catalog,
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Serve { bind } => run_serve(&cfg, bind.as_deref())?,
            CliCommand::Fetch {
                url,
                models_path,
                model_type,
                filename,
                overwrite,
            } => run_fetch(
                &cfg,
                FetchArgs {
                    url,
                    models_path,
                    model_type,
                    filename,
                    overwrite,
                },
            )?,
            CliCommand::Catalog => run_catalog(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
