use mfetch_core::logging;

mod cli;

use crate::cli::CliCommand;

fn main() {
    // Log to the state file when possible; stderr keeps the CLI usable otherwise.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", err);
    }

    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("mfetch error: {:#}", err);
        std::process::exit(1);
    }
}
