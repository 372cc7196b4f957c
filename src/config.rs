use crate::codec::Level;
use crate::error::{Error, Result};
use crate::pool::WriterPool;
use crate::predicate::CanCompress;
use http::HeaderMap;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Default minimum body size for compression.
pub const DEFAULT_MIN_SIZE: usize = 512;

/// Validated settings shared by every response of one middleware instance.
#[derive(Clone)]
pub struct Config {
    pub(crate) level: Level,
    pub(crate) min_size: usize,
    pub(crate) can_compress: Option<CanCompress>,
    pub(crate) pool: Arc<WriterPool>,
}

impl Config {
    /// Default level, a 512 byte minimum size, no predicate and a private pool.
    pub fn new() -> Self {
        Self {
            level: Level::DEFAULT,
            min_size: DEFAULT_MIN_SIZE,
            can_compress: None,
            pool: Arc::new(WriterPool::new()),
        }
    }

    /// Sets the compression level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the minimum body size required for compression.
    ///
    /// Responses whose body is smaller than this are written uncompressed.
    pub fn min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Sets the predicate deciding, from the response headers, whether to compress.
    pub fn can_compress<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&HeaderMap) -> bool + Send + Sync + 'static,
    {
        self.can_compress = Some(Arc::new(predicate));
        self
    }

    /// Uses `pool` for compressor handles, e.g. to share one pool between instances.
    pub fn pool(mut self, pool: Arc<WriterPool>) -> Self {
        self.pool = pool;
        self
    }

    /// The configured level.
    pub fn get_level(&self) -> Level {
        self.level
    }

    /// The configured minimum size.
    pub fn get_min_size(&self) -> usize {
        self.min_size
    }

    /// The compressor pool.
    pub fn get_pool(&self) -> &Arc<WriterPool> {
        &self.pool
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("level", &self.level)
            .field("min_size", &self.min_size)
            .field("can_compress", &self.can_compress.is_some())
            .field("pool", &self.pool)
            .finish()
    }
}

/// Raw, deserializable middleware settings.
///
/// Converted into a [`Config`] with `Config::try_from`, which rejects invalid
/// levels and negative sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Gzip level, `1..=9`, or `-1` for the default.
    pub level: i32,
    /// Minimum body size in bytes.
    pub min_size: i64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            level: Level::DEFAULT.get(),
            min_size: DEFAULT_MIN_SIZE as i64,
        }
    }
}

impl TryFrom<Options> for Config {
    type Error = Error;

    fn try_from(opts: Options) -> Result<Self> {
        let level = Level::new(opts.level)?;
        let min_size = usize::try_from(opts.min_size)
            .map_err(|_| Error::NegativeMinSize(opts.min_size))?;
        Ok(Config::new().level(level).min_size(min_size))
    }
}
