//! Transfer error type shared by both download paths.

use std::fmt;

/// Error returned by [`super::fetch`]: curl failure, HTTP error, or a callback
/// that refused further data.
#[derive(Debug)]
pub enum FetchError {
    /// Curl reported an error (connect failure, timeout, truncated body, ...).
    Curl(curl::Error),
    /// The final response had a non-2xx status.
    Http(u32),
    /// A head or chunk callback asked to stop (receiver gone or local write failed).
    Aborted,
}

impl FetchError {
    /// Status code for `Http` errors.
    pub fn status(&self) -> Option<u32> {
        match self {
            FetchError::Http(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Http(code) => write!(f, "upstream returned HTTP {}", code),
            FetchError::Aborted => write!(f, "transfer aborted"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            FetchError::Http(_) | FetchError::Aborted => None,
        }
    }
}

impl From<curl::Error> for FetchError {
    fn from(e: curl::Error) -> Self {
        FetchError::Curl(e)
    }
}
