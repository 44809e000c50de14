//! Response-head tracking across redirects.

/// Status and length of the response whose body is about to be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u32,
    /// `Content-Length`, when the server sent a parseable one.
    pub content_length: Option<u64>,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Accumulates raw header lines from curl's header callback. Curl reports
/// every header block it sees (redirects, `100 Continue`, a proxy's
/// `CONNECT` reply), so a new status line resets the state and only a
/// completed 2xx block yields a head. The head that belongs to the body is
/// the last completed one when the first body byte arrives.
#[derive(Debug, Default)]
pub(crate) struct HeadTracker {
    status: u32,
    content_length: Option<u64>,
    completed: Option<ResponseHead>,
}

impl HeadTracker {
    /// Feeds one header line; returns the head when `line` terminates a 2xx block.
    pub(crate) fn feed(&mut self, line: &str) -> Option<ResponseHead> {
        let line = line.trim();
        if line.is_empty() {
            let head = ResponseHead {
                status: self.status,
                content_length: self.content_length,
            };
            self.completed = head.is_success().then_some(head);
            return self.completed;
        }
        if line.starts_with("HTTP/") {
            self.status = parse_status_line(line).unwrap_or(0);
            self.content_length = None;
            self.completed = None;
            return None;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                self.content_length = value.trim().parse::<u64>().ok();
            }
        }
        None
    }

    /// Most recent complete 2xx head, if no other block has started since.
    pub(crate) fn completed(&self) -> Option<ResponseHead> {
        self.completed
    }

    /// Last status line seen, 0 if none.
    pub(crate) fn status(&self) -> u32 {
        self.status
    }

    pub(crate) fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

fn parse_status_line(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1)?.parse().ok()
}
