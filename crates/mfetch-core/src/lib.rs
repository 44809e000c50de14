//! mfetch core: streamed and blocking model downloads into sanctioned roots,
//! plus the host plumbing that exposes the streaming endpoint.

pub mod config;
pub mod logging;

pub mod direct;
pub mod emitter;
pub mod endpoint;
pub mod host;
pub mod http;
pub mod registration;
pub mod resolve;
pub mod staging;
pub mod transfer;
pub mod url_model;
