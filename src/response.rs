use crate::capability::{Capabilities, Capability, CloseNotify, Flush, Hijack, Push};
use crate::codec::Compressor;
use crate::config::Config;
use crate::error::Error;
use crate::predicate::has_content_encoding;
use crate::sniff::detect_content_type_split;
use crate::writer::ResponseWriter;
use bytes::BytesMut;
use http::header::{self, HeaderMap, HeaderValue};
use http::StatusCode;
use std::{io, mem};

/// Which way the response body goes.
enum State {
    /// Holding output until the minimum size is reached or the response ends.
    Buffering,
    /// Writing the body uncompressed.
    PassThrough,
    /// Writing the body through a pooled compressor.
    Compressing(Compressor),
    /// The handler took over the connection.
    Hijacked,
    /// Finalized; the compressor, if any, is back in the pool.
    Closed,
}

/// A [`ResponseWriter`] that gzips the body once it is large enough.
///
/// Writes are buffered until their total reaches the configured minimum
/// size. At that point the writer commits: it sniffs a `Content-Type` if none
/// is set, then either compresses (setting `Content-Encoding: gzip` and
/// dropping `Content-Length`) or passes bytes through when the handler already
/// encoded the body or the predicate declines. The status line is sent once,
/// at commit. Responses that never reach the minimum size are written
/// uncompressed by [`close`](GzipResponseWriter::close).
///
/// Dropping the writer finalizes it, so pooled compressors are returned even
/// when the handler panics.
pub struct GzipResponseWriter<'a, W: ResponseWriter + ?Sized> {
    inner: &'a mut W,
    config: &'a Config,
    caps: Capabilities,
    status: Option<StatusCode>,
    buf: BytesMut,
    state: State,
}

impl<'a, W: ResponseWriter + ?Sized> GzipResponseWriter<'a, W> {
    /// Wraps `inner`, probing which optional capabilities it offers.
    pub fn new(inner: &'a mut W, config: &'a Config) -> Self {
        let caps = Capabilities::probe(inner);
        Self {
            inner,
            config,
            caps,
            status: None,
            buf: BytesMut::new(),
            state: State::Buffering,
        }
    }

    /// Returns true once the body is being compressed.
    pub fn is_compressing(&self) -> bool {
        matches!(self.state, State::Compressing(_))
    }

    /// Returns true while no path has been chosen yet.
    pub fn is_buffering(&self) -> bool {
        matches!(self.state, State::Buffering)
    }

    /// Number of body bytes held back so far.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn inner_mut(&mut self) -> &mut W {
        self.inner
    }

    /// Ends the response, writing anything still buffered and returning the
    /// compressor to the pool. Calling it again is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        match self.state {
            State::Buffering => {
                let res = self.commit(&[], false);
                self.buf = BytesMut::new();
                self.state = State::Closed;
                res
            }
            State::Compressing(_) => {
                let State::Compressing(mut compressor) =
                    mem::replace(&mut self.state, State::Closed)
                else {
                    return Ok(());
                };
                let res = compressor.finish(self.inner);
                self.config.pool.release(compressor);
                res
            }
            State::PassThrough => {
                self.state = State::Closed;
                Ok(())
            }
            State::Hijacked | State::Closed => Ok(()),
        }
    }

    /// Chooses a path, emits the status and writes the held-back bytes followed by `tail`.
    fn commit(&mut self, tail: &[u8], threshold_met: bool) -> io::Result<()> {
        self.sniff_content_type(tail);

        let compress = threshold_met
            && !has_content_encoding(self.inner.headers())
            && self
                .config
                .can_compress
                .as_ref()
                .is_none_or(|can_compress| can_compress(self.inner.headers()));
        let status = self.status.unwrap_or(StatusCode::OK);
        let buffered = mem::take(&mut self.buf);

        tracing::trace!(
            %status,
            compress,
            buffered = buffered.len() + tail.len(),
            "committing response path"
        );

        if compress {
            strip_for_gzip(self.inner.headers_mut());
            self.inner.write_header(status);

            let compressor = self.config.pool.acquire(self.config.level);
            self.state = State::Compressing(compressor);
            if let State::Compressing(compressor) = &mut self.state {
                compressor.write(&buffered, self.inner)?;
                compressor.write(tail, self.inner)?;
            }
        } else {
            self.inner.write_header(status);
            self.state = State::PassThrough;
            if !buffered.is_empty() {
                self.inner.write_all(&buffered)?;
            }
            if !tail.is_empty() {
                self.inner.write_all(tail)?;
            }
        }
        Ok(())
    }

    fn sniff_content_type(&mut self, tail: &[u8]) {
        if self.buf.is_empty() && tail.is_empty() {
            return;
        }
        let headers = self.inner.headers_mut();
        if !headers.contains_key(header::CONTENT_TYPE) {
            let content_type = detect_content_type_split(&self.buf, tail);
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }

    /// Forces a path decision if still buffering, then pushes pending bytes downstream.
    pub(crate) fn flush_response(&mut self) -> io::Result<()> {
        match self.state {
            State::Buffering => {
                let threshold_met = self.buf.len() >= self.config.min_size;
                self.commit(&[], threshold_met)?;
            }
            State::Hijacked => return Err(Error::Hijacked.into()),
            State::Closed => return Ok(()),
            State::PassThrough | State::Compressing(_) => {}
        }

        if let State::Compressing(compressor) = &mut self.state {
            compressor.flush(self.inner)?;
        }
        if let Some(flusher) = self.inner.flusher() {
            flusher.flush()?;
        }
        Ok(())
    }

    /// Drops all response state after the connection was taken over.
    pub(crate) fn mark_hijacked(&mut self) {
        if let State::Compressing(compressor) = mem::replace(&mut self.state, State::Hijacked) {
            self.config.pool.release(compressor);
        }
        self.buf = BytesMut::new();
    }
}

/// Prepares headers for a gzip body of unknown length.
fn strip_for_gzip(headers: &mut HeaderMap) {
    headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    // A length set by the handler describes the uncompressed body.
    headers.remove(header::CONTENT_LENGTH);
    // Byte ranges cannot be served from a compressed stream.
    headers.remove(header::ACCEPT_RANGES);
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for GzipResponseWriter<'_, W> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.is_buffering() {
            self.status = Some(status);
        } else {
            tracing::debug!(%status, "ignoring status written after the response was committed");
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match &mut self.state {
            State::Buffering => {
                if data.is_empty() {
                    return Ok(0);
                }
                if self.buf.len() + data.len() < self.config.min_size {
                    self.buf.extend_from_slice(data);
                } else {
                    self.commit(data, true)?;
                }
            }
            State::PassThrough => self.inner.write_all(data)?,
            State::Compressing(compressor) => compressor.write(data, self.inner)?,
            State::Hijacked => return Err(Error::Hijacked.into()),
            State::Closed => return Err(Error::Closed.into()),
        }
        Ok(data.len())
    }

    fn close(&mut self) -> io::Result<()> {
        GzipResponseWriter::close(self)
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        Some(self)
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijack> {
        if self.caps.contains(Capability::Hijack) {
            Some(self)
        } else {
            None
        }
    }

    fn pusher(&mut self) -> Option<&mut dyn Push> {
        if self.caps.contains(Capability::Push) {
            Some(self)
        } else {
            None
        }
    }

    fn close_notifier(&mut self) -> Option<&mut dyn CloseNotify> {
        if self.caps.contains(Capability::CloseNotify) {
            Some(self)
        } else {
            None
        }
    }
}

impl<W: ResponseWriter + ?Sized> Drop for GzipResponseWriter<'_, W> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            // The response is unusable; only give the compressor back.
            if let State::Compressing(compressor) = mem::replace(&mut self.state, State::Closed) {
                self.config.pool.release(compressor);
            }
            return;
        }
        if let Err(err) = self.close() {
            tracing::debug!(error = %err, "failed to finalize gzip response on drop");
        }
    }
}
