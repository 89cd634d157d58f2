//! Request snapshot and buffered response writer.
//!
//! The middleware chain runs synchronously over an owned snapshot of
//! the request and a buffered response. The server adapts hyper types
//! at the edge (body collected up front, response flushed at the end),
//! so the core never touches the wire and handlers never block each
//! other on I/O they did not cause.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};

/// One inbound request, fully buffered.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub remote_addr: SocketAddr,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, uri: Uri, remote_addr: SocketAddr) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            remote_addr,
            body: Bytes::new(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

/// Response under construction.
///
/// Handlers write status, headers, and body here; whatever is present
/// when the chain returns is what the server sends. A handler that
/// neither sets a status nor writes a body leaves the response to its
/// returned status code.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<u16>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Append bytes to the body.
    pub fn write(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    /// Drop any body written so far (used when a mapped error page
    /// replaces a handler's output).
    pub fn clear_body(&mut self) {
        self.body.clear();
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_parts(self) -> (Option<u16>, HeaderMap, Vec<u8>) {
        (self.status, self.headers, self.body)
    }
}
