use crate::capability::Capability;
use std::io;
use thiserror::Error;

/// Errors produced by configuration, capability access and the decorated writer.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested gzip level is outside `1..=9` and is not the default sentinel.
    #[error("invalid compression level requested: {0}")]
    InvalidLevel(i32),

    /// The configured minimum size was negative.
    #[error("minimum size must be zero or more, got {0}")]
    NegativeMinSize(i64),

    /// The underlying response writer does not offer this capability.
    #[error("{0} is not supported by the underlying response writer")]
    Unsupported(Capability),

    /// The response writer was already finalized.
    #[error("response writer is closed")]
    Closed,

    /// The connection was taken over by the handler.
    #[error("connection has been hijacked")]
    Hijacked,

    /// An I/O error from the downstream writer.
    #[error("io error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: io::Error,
    },
}

impl Error {
    /// Returns true when the error only signals a missing optional capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported(_))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io { source } => source,
            other => io::Error::other(other),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
