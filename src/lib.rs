//! Gzip response compression for HTTP handlers.
//!
//! This crate provides a [`GzipHandler`] that wraps any [`Handler`] and
//! transparently gzips its response bodies when the client sends
//! `Accept-Encoding: gzip`. Output is buffered until it reaches a minimum size,
//! so small responses are sent as-is.
//!
//! # Example
//!
//! ```ignore
//! use http_gzip_handler::{GzipLayer, Level, handler_fn};
//! use tower::ServiceBuilder;
//!
//! let handler = ServiceBuilder::new()
//!     .layer(GzipLayer::new().level(Level::BEST_SPEED).min_size(1024))
//!     .service(handler_fn(|w, _req| w.write_all(b"hello")));
//! ```
//!
//! # Compression Rules
//!
//! The middleware will **not** compress a response when:
//! - The request does not accept `gzip` with a non-zero quality
//! - The body ends before reaching the minimum size (default: 512 bytes)
//! - `Content-Encoding` is already set by the handler
//! - The configured predicate rejects the response headers
//!
//! # Response Modifications
//!
//! - `Vary` includes `Accept-Encoding` on every response, compressed or not
//! - `Content-Type` is sniffed from the first bytes of the body when unset
//!
//! When compression is applied:
//! - `Content-Encoding` is set to `gzip`
//! - `Content-Length` is removed (compressed size is unknown)
//! - `Accept-Ranges` is removed
//!
//! Flush, hijack, server push and close notification are passed through when
//! the underlying writer supports them.

#![deny(missing_docs)]

pub mod accept;
mod capability;
mod codec;
mod config;
mod error;
mod handler;
mod layer;
mod pool;
pub mod predicate;
mod recorder;
mod response;
mod service;
pub mod sniff;
#[cfg(test)]
mod test_util;
mod writer;

pub use capability::{
    Capabilities, Capability, CloseNotify, Flush, Hijack, Push, PushOptions, Upgraded,
};
pub use codec::{Compressor, Level};
pub use config::{Config, DEFAULT_MIN_SIZE, Options};
pub use error::{Error, Result};
pub use handler::{GzipHandler, Handler, HandlerFn, handler_fn};
pub use layer::GzipLayer;
pub use pool::{DEFAULT_MAX_IDLE, WriterPool};
pub use predicate::CanCompress;
pub use recorder::ResponseRecorder;
pub use response::GzipResponseWriter;
pub use service::HandlerService;
pub use writer::ResponseWriter;
