use crate::capability::{CloseNotify, Flush, Hijack, Push};
use http::{HeaderMap, StatusCode};
use std::io;

/// The response sink a [`Handler`](crate::Handler) writes into.
///
/// Headers are mutable until the status line is emitted by
/// [`write_header`](ResponseWriter::write_header) or by the first body write,
/// which implies `200 OK`. A successful [`write`](ResponseWriter::write)
/// consumes the whole buffer; short writes are reported as errors.
///
/// Optional transport capabilities are discovered through the `*er` accessors,
/// which return `None` when the sink does not offer them.
pub trait ResponseWriter {
    /// Response headers.
    fn headers(&self) -> &HeaderMap;

    /// Mutable response headers.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Sends the status line with the current headers.
    fn write_header(&mut self, status: StatusCode);

    /// Writes body bytes, sending `200 OK` first if no status was sent.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Writes the whole buffer, retrying on partial writes.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole response buffer",
                    ));
                }
                Ok(n) => buf = &buf[n..],
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Finalizes the response. Plain sinks have nothing to do.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Explicit flushing, if supported.
    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        None
    }

    /// Connection takeover, if supported.
    fn hijacker(&mut self) -> Option<&mut dyn Hijack> {
        None
    }

    /// Server push, if supported.
    fn pusher(&mut self) -> Option<&mut dyn Push> {
        None
    }

    /// Client disconnect notification, if supported.
    fn close_notifier(&mut self) -> Option<&mut dyn CloseNotify> {
        None
    }
}
