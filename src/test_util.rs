use crate::capability::{
    Capabilities, Capability, CloseNotify, Flush, Hijack, Push, PushOptions, Upgraded,
};
use crate::error::Result;
use crate::writer::ResponseWriter;
use flate2::read::GzDecoder;
use http::{HeaderMap, StatusCode};
use std::io::{self, Cursor, Read};
use std::sync::mpsc;

pub(crate) fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    out
}

/// `n` bytes of a repeating, compressible pattern.
pub(crate) fn test_body(n: usize) -> Vec<u8> {
    b"aaabbbccc".iter().copied().cycle().take(n).collect()
}

/// About `n` bytes of word salad, deterministic but far less repetitive than [`test_body`].
pub(crate) fn varied_body(n: usize) -> Vec<u8> {
    const WORDS: [&str; 16] = [
        "gzip", "handler", "buffer", "level", "writer", "pool", "header", "status",
        "flush", "vary", "sniff", "commit", "body", "client", "stream", "close",
    ];
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    let mut out = Vec::with_capacity(n + 16);
    while out.len() < n {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        out.extend_from_slice(WORDS[(state >> 60) as usize].as_bytes());
        out.push(if (state >> 40) & 7 == 0 { b'\n' } else { b' ' });
    }
    out
}

/// A sink offering every optional capability unless told otherwise.
pub(crate) struct FullWriter {
    headers: HeaderMap,
    status: Option<StatusCode>,
    body: Vec<u8>,
    pushed: Vec<(String, PushOptions)>,
    hijacked: bool,
    caps: Capabilities,
}

impl FullWriter {
    pub(crate) fn new() -> Self {
        Self {
            headers: HeaderMap::new(),
            status: None,
            body: Vec::new(),
            pushed: Vec::new(),
            hijacked: false,
            caps: Capability::ALL.into_iter().collect(),
        }
    }

    pub(crate) fn without(mut self, cap: Capability) -> Self {
        self.caps = self.caps.iter().filter(|c| *c != cap).collect();
        self
    }

    pub(crate) fn pushed(&self) -> &[(String, PushOptions)] {
        &self.pushed
    }

    pub(crate) fn hijacked(&self) -> bool {
        self.hijacked
    }

    pub(crate) fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub(crate) fn body(&self) -> &[u8] {
        &self.body
    }
}

impl ResponseWriter for FullWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status.get_or_insert(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.status.get_or_insert(StatusCode::OK);
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        if self.caps.contains(Capability::Flush) {
            Some(self)
        } else {
            None
        }
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

impl Flush for FullWriter {
    fn flush(&mut self) -> io::Result<()> {
        self.status.get_or_insert(StatusCode::OK);
        Ok(())
    }
}

impl Hijack for FullWriter {
    fn hijack(&mut self) -> Result<Box<dyn Upgraded>> {
        self.hijacked = true;
        Ok(Box::new(Cursor::new(Vec::new())))
    }
}

impl Push for FullWriter {
    fn push(&mut self, target: &str, opts: Option<PushOptions>) -> Result<()> {
        self.pushed.push((target.to_owned(), opts.unwrap_or_default()));
        Ok(())
    }
}

impl CloseNotify for FullWriter {
    fn close_notify(&mut self) -> Result<mpsc::Receiver<()>> {
        let (tx, rx) = mpsc::channel();
        // The client is already gone.
        let _ = tx.send(());
        Ok(rx)
    }
}

/// A sink whose connection is broken.
#[derive(Default)]
pub(crate) struct FailingWriter {
    headers: HeaderMap,
}

impl FailingWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl ResponseWriter for FailingWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, _status: StatusCode) {}

    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection reset"))
    }
}
