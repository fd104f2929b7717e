//! Status-recording response writer.

use std::io;

use http::{HeaderMap, StatusCode};

use crate::handler::ResponseWriter;

/// Wraps a [`ResponseWriter`] and remembers the status the client will see.
///
/// Every call is forwarded unchanged; body bytes are never held. The recorded
/// status is the first one written explicitly, or `200 OK` if body bytes are
/// written first (or nothing is written at all).
///
/// Only a call to `write` commits the implicit `200`. `write_all(b"")` never
/// reaches `write`, so an empty body write leaves the status open.
///
/// A recorder borrows the writer of exactly one request.
pub struct StatusRecorder<'w> {
    inner: &'w mut dyn ResponseWriter,
    status: Option<StatusCode>,
}

impl<'w> StatusRecorder<'w> {
    pub fn new(inner: &'w mut dyn ResponseWriter) -> Self {
        Self { inner, status: None }
    }

    /// The status observed so far.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }
}

impl ResponseWriter for StatusRecorder<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
        self.inner.write_status(status);
    }
}

impl io::Write for StatusRecorder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
