use crate::capability::Flush;
use crate::writer::ResponseWriter;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::Full;
use std::io;

/// An in-memory [`ResponseWriter`].
///
/// Records the status, a snapshot of the headers as they were when the status
/// was sent, and the body. Supports [`Flush`] and no other capability.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    headers: HeaderMap,
    status: Option<StatusCode>,
    snapshot: Option<HeaderMap>,
    body: BytesMut,
    header_writes: usize,
    flushed: bool,
}

impl ResponseRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The sent status, or `200 OK` if none was sent.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Headers as sent with the status line, or the live headers if nothing was sent.
    pub fn header_snapshot(&self) -> &HeaderMap {
        self.snapshot.as_ref().unwrap_or(&self.headers)
    }

    /// The recorded body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// How many times `write_header` was called.
    pub fn header_writes(&self) -> usize {
        self.header_writes
    }

    /// Whether the handler flushed the response.
    pub fn was_flushed(&self) -> bool {
        self.flushed
    }

    /// Converts the recording into an `http::Response`.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        let headers = self.snapshot.unwrap_or(self.headers);

        let mut response = Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        self.header_writes += 1;
        if self.status.is_some() {
            return;
        }
        self.status = Some(status);
        self.snapshot = Some(self.headers.clone());
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        Some(self)
    }
}

impl Flush for ResponseRecorder {
    fn flush(&mut self) -> io::Result<()> {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.flushed = true;
        Ok(())
    }
}
