//! Transport-side response writer.
//!
//! [`BufferedResponse`] is what the server hands to the handler chain. It
//! collects the status, headers and body that handlers write and turns them
//! into one hyper response once the chain returns. Middleware never sees this
//! type directly, only `&mut dyn ResponseWriter`.

use std::io;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use http_body_util::Full;

use crate::handler::ResponseWriter;

/// Plain-text content type used by the built-in handlers.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Collects a response in memory.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed status, or `200 OK` if nothing was written.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Converts the collected response into the form hyper sends.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let status = self.status();
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseWriter for BufferedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }
}

impl io::Write for BufferedResponse {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_status(StatusCode::OK);
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes a complete plain-text response.
///
/// Sets `content-type` unless a handler already chose one.
pub fn write_text(w: &mut dyn ResponseWriter, status: StatusCode, body: &str) -> io::Result<()> {
    w.headers_mut()
        .entry(header::CONTENT_TYPE)
        .or_insert(HeaderValue::from_static(TEXT_PLAIN));
    w.write_status(status);
    w.write_all(body.as_bytes())
}
