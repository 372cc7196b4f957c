use crate::codec::Level;
use crate::config::{Config, Options};
use crate::error::Error;
use crate::handler::GzipHandler;
use crate::pool::WriterPool;
use http::HeaderMap;
use std::sync::Arc;
use tower::Layer;

/// A Tower layer that wraps handlers in [`GzipHandler`].
///
/// All handlers produced by one layer share its configuration, including the
/// compressor pool.
#[derive(Debug, Clone, Default)]
pub struct GzipLayer {
    config: Config,
}

impl GzipLayer {
    /// Creates a new gzip layer with default settings.
    ///
    /// The default level is the codec's default and the default minimum size
    /// is 512 bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a layer from an existing configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Sets the compression level.
    pub fn level(mut self, level: Level) -> Self {
        self.config = self.config.level(level);
        self
    }

    /// Sets the minimum body size required for compression.
    ///
    /// Responses that finish with fewer body bytes than this are written
    /// uncompressed.
    pub fn min_size(mut self, size: usize) -> Self {
        self.config = self.config.min_size(size);
        self
    }

    /// Sets the predicate consulted, with the final response headers, before compressing.
    pub fn can_compress<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&HeaderMap) -> bool + Send + Sync + 'static,
    {
        self.config = self.config.can_compress(predicate);
        self
    }

    /// Uses a shared compressor pool.
    pub fn pool(mut self, pool: Arc<WriterPool>) -> Self {
        self.config = self.config.pool(pool);
        self
    }

    /// The configuration handed to each wrapped handler.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl TryFrom<Options> for GzipLayer {
    type Error = Error;

    fn try_from(opts: Options) -> Result<Self, Self::Error> {
        Config::try_from(opts).map(Self::from_config)
    }
}

impl<H> Layer<H> for GzipLayer {
    type Service = GzipHandler<H>;

    fn layer(&self, inner: H) -> Self::Service {
        GzipHandler::with_config(inner, self.config.clone())
    }
}
