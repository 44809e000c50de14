//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a single static body on every GET. Options let a test pick the
//! status line, drop `Content-Length`, or cut the connection after N body
//! bytes to simulate a network failure mid-transfer. GETs are counted so a
//! test can assert that no network I/O happened.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Status line sent for GET, e.g. `"200 OK"` or `"404 Not Found"`.
    pub status: &'static str,
    /// If false, omit `Content-Length` and end the body by closing the connection.
    pub send_length: bool,
    /// Close the connection after this many body bytes (length header still
    /// announces the full body).
    pub truncate_after: Option<usize>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            status: "200 OK",
            send_length: true,
            truncate_after: None,
        }
    }
}

/// A running test server. Runs until the process exits.
pub struct TestServer {
    base: String,
    gets: Arc<AtomicUsize>,
}

impl TestServer {
    /// URL for `path` on this server, e.g. `url("model.bin")`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Number of GET requests received so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

pub fn start(body: Vec<u8>) -> TestServer {
    start_with_options(body, ServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: ServerOptions) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let gets = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&gets);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &body, opts, &counter));
        }
    });
    TestServer {
        base: format!("http://127.0.0.1:{}/", port),
        gets,
    }
}

fn handle(mut stream: TcpStream, body: &[u8], opts: ServerOptions, gets: &AtomicUsize) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let method = request.split_whitespace().next().unwrap_or("");
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    gets.fetch_add(1, Ordering::SeqCst);

    let success = opts.status.starts_with('2');
    let payload = if success { body } else { &b"not here"[..] };
    let length = if opts.send_length {
        format!("Content-Length: {}\r\n", payload.len())
    } else {
        String::new()
    };
    let head = format!(
        "HTTP/1.1 {}\r\n{}Connection: close\r\n\r\n",
        opts.status, length
    );
    let _ = stream.write_all(head.as_bytes());

    let sent = match opts.truncate_after {
        Some(limit) if success => &payload[..limit.min(payload.len())],
        _ => payload,
    };
    let _ = stream.write_all(sent);
    let _ = stream.flush();
    let _ = stream.shutdown(Shutdown::Both);
}
