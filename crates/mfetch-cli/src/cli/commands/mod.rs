//! CLI command handlers, one file per command.

mod catalog;
mod fetch;
mod serve;

pub use catalog::run_catalog;
pub use fetch::{run_fetch, FetchArgs};
pub use serve::run_serve;
