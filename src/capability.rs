//! Optional transport capabilities and how the gzip writer re-exposes them.
//!
//! A raw sink may support any combination of [`Flush`], [`Hijack`], [`Push`]
//! and [`CloseNotify`]. [`GzipResponseWriter`] probes the sink once when it is
//! built and then answers capability queries from that [`Capabilities`] set,
//! so a handler sees exactly what the connection offers: flush always (the
//! writer needs it to push compressed bytes out), the other three only when
//! the sink has them.

use crate::error::{Error, Result};
use crate::response::GzipResponseWriter;
use crate::writer::ResponseWriter;
use http::header::ACCEPT_ENCODING;
use http::{HeaderMap, HeaderValue, Method};
use std::fmt;
use std::io;
use std::sync::mpsc::Receiver;

/// Sends buffered response data to the client immediately.
pub trait Flush {
    /// Flushes pending response bytes.
    fn flush(&mut self) -> io::Result<()>;
}

/// A connection taken over from the HTTP server.
pub trait Upgraded: io::Read + io::Write + Send {}

impl<T: io::Read + io::Write + Send> Upgraded for T {}

/// Hands the underlying connection to the handler.
pub trait Hijack {
    /// Takes over the connection. The server stops writing to it afterwards.
    fn hijack(&mut self) -> Result<Box<dyn Upgraded>>;
}

/// Options for an HTTP/2 server push.
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Request method of the promised request; `GET` when unset.
    pub method: Option<Method>,
    /// Headers of the promised request.
    pub headers: HeaderMap,
}

/// Initiates HTTP/2 server pushes.
pub trait Push {
    /// Pushes `target` to the client.
    fn push(&mut self, target: &str, opts: Option<PushOptions>) -> Result<()>;
}

/// Notifies the handler when the client goes away.
pub trait CloseNotify {
    /// Returns a receiver that yields once the client connection closes.
    fn close_notify(&mut self) -> Result<Receiver<()>>;
}

/// A single optional capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// See [`Flush`].
    Flush,
    /// See [`Hijack`].
    Hijack,
    /// See [`Push`].
    Push,
    /// See [`CloseNotify`].
    CloseNotify,
}

impl Capability {
    /// All capabilities, in probe order.
    pub const ALL: [Capability; 4] = [
        Capability::Flush,
        Capability::Hijack,
        Capability::Push,
        Capability::CloseNotify,
    ];

    fn bit(self) -> u8 {
        match self {
            Capability::Flush => 1,
            Capability::Hijack => 1 << 1,
            Capability::Push => 1 << 2,
            Capability::CloseNotify => 1 << 3,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Flush => "flush",
            Capability::Hijack => "hijack",
            Capability::Push => "server push",
            Capability::CloseNotify => "close notification",
        })
    }
}

/// The set of optional capabilities a response writer offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No optional capabilities.
    pub const NONE: Capabilities = Capabilities(0);

    /// Queries a writer for each optional capability.
    pub fn probe<W: ResponseWriter + ?Sized>(writer: &mut W) -> Self {
        let mut caps = Self::NONE;
        if writer.flusher().is_some() {
            caps = caps.with(Capability::Flush);
        }
        if writer.hijacker().is_some() {
            caps = caps.with(Capability::Hijack);
        }
        if writer.pusher().is_some() {
            caps = caps.with(Capability::Push);
        }
        if writer.close_notifier().is_some() {
            caps = caps.with(Capability::CloseNotify);
        }
        caps
    }

    /// Returns this set with `cap` added.
    pub fn with(self, cap: Capability) -> Self {
        Capabilities(self.0 | cap.bit())
    }

    /// Returns true if `cap` is in the set.
    pub fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    /// Iterates the capabilities in the set.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |cap| self.contains(*cap))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

impl<'a> dyn ResponseWriter + 'a {
    /// The optional capabilities this writer offers.
    pub fn capabilities(&mut self) -> Capabilities {
        Capabilities::probe(self)
    }

    /// Flushes the response, or reports [`Error::Unsupported`].
    pub fn flush(&mut self) -> Result<()> {
        let flusher = self
            .flusher()
            .ok_or(Error::Unsupported(Capability::Flush))?;
        Ok(flusher.flush()?)
    }

    /// Hijacks the connection, or reports [`Error::Unsupported`].
    pub fn hijack(&mut self) -> Result<Box<dyn Upgraded>> {
        self.hijacker()
            .ok_or(Error::Unsupported(Capability::Hijack))?
            .hijack()
    }

    /// Pushes a resource, or reports [`Error::Unsupported`].
    pub fn push(&mut self, target: &str, opts: Option<PushOptions>) -> Result<()> {
        self.pusher()
            .ok_or(Error::Unsupported(Capability::Push))?
            .push(target, opts)
    }

    /// Subscribes to client disconnects, or reports [`Error::Unsupported`].
    pub fn close_notify(&mut self) -> Result<Receiver<()>> {
        self.close_notifier()
            .ok_or(Error::Unsupported(Capability::CloseNotify))?
            .close_notify()
    }
}

/// Sets `Accept-Encoding: gzip` on push options without overriding an existing value.
fn with_accept_encoding(opts: Option<PushOptions>) -> PushOptions {
    let mut opts = opts.unwrap_or_default();
    let has_encoding = opts
        .headers
        .get(ACCEPT_ENCODING)
        .is_some_and(|v| !v.as_bytes().is_empty());
    if !has_encoding {
        opts.headers
            .insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
    }
    opts
}

impl<W: ResponseWriter + ?Sized> Flush for GzipResponseWriter<'_, W> {
    fn flush(&mut self) -> io::Result<()> {
        self.flush_response()
    }
}

impl<W: ResponseWriter + ?Sized> Hijack for GzipResponseWriter<'_, W> {
    fn hijack(&mut self) -> Result<Box<dyn Upgraded>> {
        let conn = self
            .inner_mut()
            .hijacker()
            .ok_or(Error::Unsupported(Capability::Hijack))?
            .hijack()?;
        self.mark_hijacked();
        Ok(conn)
    }
}

impl<W: ResponseWriter + ?Sized> Push for GzipResponseWriter<'_, W> {
    fn push(&mut self, target: &str, opts: Option<PushOptions>) -> Result<()> {
        self.inner_mut()
            .pusher()
            .ok_or(Error::Unsupported(Capability::Push))?
            .push(target, Some(with_accept_encoding(opts)))
    }
}

impl<W: ResponseWriter + ?Sized> CloseNotify for GzipResponseWriter<'_, W> {
    fn close_notify(&mut self) -> Result<Receiver<()>> {
        self.inner_mut()
            .close_notifier()
            .ok_or(Error::Unsupported(Capability::CloseNotify))?
            .close_notify()
    }
}
