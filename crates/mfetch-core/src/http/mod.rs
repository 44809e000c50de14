//! Blocking HTTP GET via libcurl, delivering the body in bounded chunks.
//!
//! Both download paths sit on top of [`fetch`]: the blocking adapter calls it
//! directly, the streaming downloader runs it inside `spawn_blocking` and
//! forwards chunks to the async side over a channel.

mod error;
mod head;

pub use error::FetchError;
pub use head::ResponseHead;

use head::HeadTracker;
use std::cell::{Cell, RefCell};
use std::str;
use std::time::Duration;

use crate::config::MfetchConfig;

const USER_AGENT: &str = concat!("mfetch/", env!("CARGO_PKG_VERSION"));

/// Transfer knobs. No option sets a total deadline: large artifacts must not
/// be killed by a wall-clock timeout.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Bytes per delivered chunk (the last chunk may be shorter).
    pub chunk_size: usize,
    pub connect_timeout: Option<Duration>,
    /// Abort when fewer than 1 byte/s arrives for this long.
    pub stall_timeout: Option<Duration>,
}

impl FetchOptions {
    /// Options for the interactive streaming path: connect timeout only.
    pub fn streaming(cfg: &MfetchConfig) -> Self {
        Self {
            chunk_size: cfg.chunk_size(),
            connect_timeout: Some(cfg.connect_timeout()),
            stall_timeout: None,
        }
    }

    /// Options for the blocking path: connect timeout plus stall detection.
    pub fn blocking(cfg: &MfetchConfig) -> Self {
        Self {
            chunk_size: cfg.chunk_size(),
            connect_timeout: Some(cfg.connect_timeout()),
            stall_timeout: cfg.stall_timeout(),
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::streaming(&MfetchConfig::default())
    }
}

/// Performs a GET on `url`, following redirects.
///
/// `on_head` runs once, with the 2xx head of the response whose body is
/// delivered, before any body bytes. Intermediate blocks (redirects, a
/// proxy's `CONNECT` reply) are never reported. `on_chunk` then receives the body in chunks of `chunk_size` bytes
/// (never empty). Either callback returning `false` aborts the transfer with
/// [`FetchError::Aborted`]. A non-2xx final status fails with
/// [`FetchError::Http`] and delivers no chunks.
///
/// Runs in the current thread; call from `spawn_blocking` if used from async code.
/// Returns the number of body bytes delivered.
pub fn fetch<H, C>(
    url: &str,
    opts: &FetchOptions,
    mut on_head: H,
    mut on_chunk: C,
) -> Result<u64, FetchError>
where
    H: FnMut(ResponseHead) -> bool,
    C: FnMut(Vec<u8>) -> bool,
{
    let chunk_size = opts.chunk_size.max(1);

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.useragent(USER_AGENT)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.fail_on_error(true)?;
    if let Some(t) = opts.connect_timeout {
        easy.connect_timeout(t)?;
    }
    if let Some(stall) = opts.stall_timeout {
        easy.low_speed_limit(1)?;
        easy.low_speed_time(stall)?;
    }

    let tracker = RefCell::new(HeadTracker::default());
    let head_sent = Cell::new(false);
    let aborted = Cell::new(false);
    let mut buf: Vec<u8> = Vec::with_capacity(chunk_size);
    let mut delivered = 0u64;

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(line) = str::from_utf8(data) {
                tracker.borrow_mut().feed(line);
            }
            true
        })?;
        transfer.write_function(|data| {
            if !head_sent.get() {
                // Body without a completed 2xx head (e.g. an unfollowed 3xx): drop it,
                // the status check after perform reports the failure.
                let Some(head) = tracker.borrow().completed() else {
                    return Ok(data.len());
                };
                head_sent.set(true);
                if !on_head(head) {
                    aborted.set(true);
                    return Ok(0);
                }
            }
            buf.extend_from_slice(data);
            while buf.len() >= chunk_size {
                let rest = buf.split_off(chunk_size);
                let chunk = std::mem::replace(&mut buf, rest);
                delivered += chunk.len() as u64;
                if !on_chunk(chunk) {
                    aborted.set(true);
                    return Ok(0);
                }
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if aborted.get() {
            return Err(FetchError::Aborted);
        }
        if e.is_http_returned_error() {
            let code = easy
                .response_code()
                .unwrap_or_else(|_| tracker.borrow().status());
            return Err(FetchError::Http(code));
        }
        return Err(FetchError::Curl(e));
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }

    if !head_sent.get() {
        let tracker = tracker.borrow();
        let head = tracker.completed().unwrap_or(ResponseHead {
            status: code,
            content_length: tracker.content_length(),
        });
        if !on_head(head) {
            return Err(FetchError::Aborted);
        }
    }

    if !buf.is_empty() {
        delivered += buf.len() as u64;
        if !on_chunk(buf) {
            return Err(FetchError::Aborted);
        }
    }

    Ok(delivered)
}
