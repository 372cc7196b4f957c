use crate::accept::accepts_gzip;
use crate::config::Config;
use crate::response::GzipResponseWriter;
use crate::writer::ResponseWriter;
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue};
use http::Request;
use std::io;
use std::sync::Arc;

/// Produces a response for a request by writing into a [`ResponseWriter`].
pub trait Handler {
    /// Handles one request.
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: &Request<Bytes>) -> io::Result<()>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: &Request<Bytes>) -> io::Result<()> {
        (**self).serve_http(w, req)
    }
}

/// A [`Handler`] backed by a closure. Created by [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wraps a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut dyn ResponseWriter, &Request<Bytes>) -> io::Result<()>,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut dyn ResponseWriter, &Request<Bytes>) -> io::Result<()>,
{
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: &Request<Bytes>) -> io::Result<()> {
        (self.f)(w, req)
    }
}

/// A [`Handler`] that gzips the responses of an inner handler.
///
/// Every response gets `Vary: Accept-Encoding`. When the request accepts gzip
/// the inner handler writes into a [`GzipResponseWriter`], which is finalized
/// after the handler returns, whether it succeeded, failed or panicked.
#[derive(Debug, Clone)]
pub struct GzipHandler<H> {
    inner: H,
    config: Config,
}

impl<H> GzipHandler<H> {
    /// Wraps `inner` with the default configuration.
    pub fn new(inner: H) -> Self {
        Self::with_config(inner, Config::default())
    }

    /// Wraps `inner` with `config`.
    pub fn with_config(inner: H, config: Config) -> Self {
        Self { inner, config }
    }

    /// Returns a reference to the inner handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consumes this handler, returning the inner handler.
    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: Handler> Handler for GzipHandler<H> {
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: &Request<Bytes>) -> io::Result<()> {
        add_vary_accept_encoding(w.headers_mut());

        if !accepts_gzip(req.headers()) {
            return self.inner.serve_http(w, req);
        }

        let mut gw = GzipResponseWriter::new(w, &self.config);
        let served = self.inner.serve_http(&mut gw, req);
        let closed = gw.close();
        served.and(closed)
    }
}

/// Adds Accept-Encoding to the Vary header if not already present.
fn add_vary_accept_encoding(headers: &mut HeaderMap) {
    // Check all Vary headers to see if Accept-Encoding is already present
    for vary in headers.get_all(header::VARY) {
        if let Ok(vary_str) = vary.to_str() {
            let listed = vary_str.split(',').any(|v| {
                let v = v.trim();
                v == "*" || v.eq_ignore_ascii_case("accept-encoding")
            });
            if listed {
                return;
            }
        }
    }

    headers.append(header::VARY, HeaderValue::from_static("Accept-Encoding"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::PushOptions;
    use crate::codec::{Compressor, Level};
    use crate::pool::WriterPool;
    use crate::recorder::ResponseRecorder;
    use crate::sniff::detect_content_type;
    use crate::test_util::{FullWriter, gunzip, test_body, varied_body};
    use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, VARY};
    use http::StatusCode;

    fn request(accept_encoding: Option<&'static str>, body: &[u8]) -> Request<Bytes> {
        let mut req = Request::new(Bytes::copy_from_slice(body));
        if let Some(value) = accept_encoding {
            req.headers_mut()
                .insert(ACCEPT_ENCODING, HeaderValue::from_static(value));
        }
        req
    }

    fn serve<H: Handler>(handler: &H, req: &Request<Bytes>) -> ResponseRecorder {
        let mut rec = ResponseRecorder::new();
        handler.serve_http(&mut rec, req).unwrap();
        rec
    }

    fn body_handler(body: Vec<u8>) -> GzipHandler<impl Handler> {
        GzipHandler::new(handler_fn(move |w, _req| {
            w.write_all(&body)?;
            Ok(())
        }))
    }

    fn echo_handler(config: Config) -> GzipHandler<impl Handler> {
        GzipHandler::with_config(
            handler_fn(|w, req| {
                // Write several times so later writes take the chosen path.
                w.write_all(req.body())?;
                w.write_all(req.body())?;
                w.write_all(req.body())?;
                Ok(())
            }),
            config,
        )
    }

    #[test]
    fn test_no_accept_encoding_passes_through() {
        let body = test_body(600);
        let rec = serve(&body_handler(body.clone()), &request(None, b""));

        assert_eq!(rec.status(), StatusCode::OK);
        let headers = rec.header_snapshot();
        assert!(headers.get(CONTENT_ENCODING).is_none());
        assert_eq!(headers[VARY], "Accept-Encoding");
        assert_eq!(rec.body(), body);
    }

    #[test]
    fn test_gzip_accepted_compresses() {
        let body = test_body(600);
        let rec = serve(&body_handler(body.clone()), &request(Some("gzip"), b""));

        assert_eq!(rec.status(), StatusCode::OK);
        let headers = rec.header_snapshot();
        assert_eq!(headers[CONTENT_ENCODING], "gzip");
        assert_eq!(headers[VARY], "Accept-Encoding");
        assert_eq!(headers[CONTENT_TYPE], detect_content_type(&body));
        assert_eq!(gunzip(rec.body()), body);
    }

    #[test]
    fn test_accept_encoding_case_insensitive() {
        let body = test_body(600);
        let rec = serve(&body_handler(body.clone()), &request(Some("GZIP"), b""));

        assert_eq!(rec.header_snapshot()[CONTENT_ENCODING], "gzip");
        assert_eq!(gunzip(rec.body()), body);
    }

    #[test]
    fn test_zero_quality_is_not_accepted() {
        let body = test_body(600);
        let rec = serve(&body_handler(body.clone()), &request(Some("gzip;q=0, br"), b""));

        assert!(rec.header_snapshot().get(CONTENT_ENCODING).is_none());
        assert_eq!(rec.header_snapshot()[VARY], "Accept-Encoding");
        assert_eq!(rec.body(), body);
    }

    #[test]
    fn test_every_level() {
        let body = varied_body(4 * 1024);
        for raw in 1..=9 {
            let level = Level::new(raw).unwrap();
            let handler = GzipHandler::with_config(
                handler_fn(|w, req| {
                    w.write_header(StatusCode::OK);
                    w.write_all(req.body())
                }),
                Config::new().level(level),
            );
            let rec = serve(&handler, &request(Some("gzip"), &body));

            let mut reference = ResponseRecorder::new();
            let mut compressor = Compressor::new(0, level);
            compressor.write(&body, &mut reference).unwrap();
            compressor.finish(&mut reference).unwrap();

            assert_eq!(rec.header_snapshot()[CONTENT_ENCODING], "gzip", "level {raw}");
            assert_eq!(rec.body(), reference.body(), "level {raw}");
            assert_eq!(gunzip(rec.body()), body, "level {raw}");
        }
    }

    #[test]
    fn test_no_body() {
        for status in [StatusCode::NO_CONTENT, StatusCode::NOT_MODIFIED, StatusCode::OK] {
            let handler = GzipHandler::new(handler_fn(move |w, _req| {
                w.write_header(status);
                Ok(())
            }));
            let rec = serve(&handler, &request(Some("gzip"), b""));

            assert_eq!(rec.status(), status);
            let headers = rec.header_snapshot();
            assert!(headers.get(CONTENT_ENCODING).is_none(), "for {status}");
            assert_eq!(headers[VARY], "Accept-Encoding", "for {status}");
            assert!(rec.body().is_empty(), "for {status}");
        }
    }

    #[test]
    fn test_not_found_status() {
        let handler = GzipHandler::new(handler_fn(|w, _req| {
            w.write_header(StatusCode::NOT_FOUND);
            Ok(())
        }));
        let rec = serve(&handler, &request(Some("gzip"), b""));
        assert_eq!(rec.status(), StatusCode::NOT_FOUND);
        assert!(rec.body().is_empty());
    }

    #[test]
    fn test_stale_content_length_removed() {
        let body = test_body(600);
        let handler = GzipHandler::new(handler_fn(|w, _req| {
            let body = test_body(600);
            w.headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            w.write_all(&body)
        }));
        let rec = serve(&handler, &request(Some("gzip"), b""));

        let headers = rec.header_snapshot();
        assert_eq!(headers[CONTENT_ENCODING], "gzip");
        assert!(headers.get(CONTENT_LENGTH).is_none());
        assert_ne!(rec.body(), body);
        assert_eq!(gunzip(rec.body()), body);
    }

    #[test]
    fn test_min_size() {
        let handler = echo_handler(Config::new().min_size(13));

        let rec = serve(&handler, &request(Some("gzip"), b"test"));
        assert!(rec.header_snapshot().get(CONTENT_ENCODING).is_none());
        assert_eq!(rec.body(), b"testtesttest");

        let body = b"testtesttesttesttest".to_vec();
        let rec = serve(&handler, &request(Some("gzip"), &body));
        assert_eq!(rec.header_snapshot()[CONTENT_ENCODING], "gzip");
        assert_eq!(gunzip(rec.body()), [&body[..], &body[..], &body[..]].concat());
    }

    #[test]
    fn test_four_byte_body_below_min_size() {
        let handler = GzipHandler::with_config(
            handler_fn(|w, _req| w.write_all(b"tiny")),
            Config::new().min_size(13),
        );
        let rec = serve(&handler, &request(Some("gzip"), b""));
        assert!(rec.header_snapshot().get(CONTENT_ENCODING).is_none());
        assert_eq!(rec.body(), b"tiny");
    }

    #[test]
    fn test_double_close_from_handler() {
        let pool = Arc::new(WriterPool::new());
        let handler = GzipHandler::with_config(
            handler_fn(|w, _req| {
                w.write_all(b"test")?;
                // The middleware closes again once the handler returns.
                w.close()
            }),
            Config::new().min_size(0).pool(pool.clone()),
        );
        let rec = serve(&handler, &request(Some("gzip"), b""));
        assert_eq!(gunzip(rec.body()), b"test");

        let w1 = pool.acquire(Level::DEFAULT);
        let w2 = pool.acquire(Level::DEFAULT);
        assert_ne!(w1.id(), w2.id());
    }

    #[test]
    fn test_infer_content_type_compressed() {
        let handler = GzipHandler::with_config(
            handler_fn(|w, _req| {
                w.write_all(b"<!doc")?;
                w.write_all(b"type html>")
            }),
            Config::new().min_size("<!doctype html".len()),
        );
        let rec = serve(&handler, &request(Some("gzip"), b""));

        let headers = rec.header_snapshot();
        assert_eq!(headers[CONTENT_ENCODING], "gzip");
        assert_eq!(headers[CONTENT_TYPE], "text/html; charset=utf-8");
    }

    #[test]
    fn test_infer_content_type_uncompressed() {
        let handler = GzipHandler::new(handler_fn(|w, _req| w.write_all(b"<!doctype html>")));
        let rec = serve(&handler, &request(Some("gzip"), b""));

        let headers = rec.header_snapshot();
        assert!(headers.get(CONTENT_ENCODING).is_none());
        assert_eq!(headers[CONTENT_TYPE], "text/html; charset=utf-8");
    }

    #[test]
    fn test_pass_through_big_write() {
        let handler = echo_handler(Config::new().min_size(10).can_compress(|_| false));
        let rec = serve(&handler, &request(Some("gzip"), b"01234567890123"));

        assert!(rec.header_snapshot().get(CONTENT_ENCODING).is_none());
        assert_eq!(rec.body(), b"012345678901230123456789012301234567890123");
    }

    #[test]
    fn test_pass_through_small_writes() {
        let handler = echo_handler(Config::new().min_size(10).can_compress(|_| false));
        let rec = serve(&handler, &request(Some("gzip"), b"012345678"));

        assert!(rec.header_snapshot().get(CONTENT_ENCODING).is_none());
        assert_eq!(rec.body(), b"012345678012345678012345678");
    }

    #[test]
    fn test_vary_not_duplicated() {
        let handler = GzipHandler::new(handler_fn(|w, _req| w.write_all(b"x")));
        let mut rec = ResponseRecorder::new();
        rec.headers_mut()
            .insert(VARY, HeaderValue::from_static("accept-encoding"));
        handler.serve_http(&mut rec, &request(Some("gzip"), b"")).unwrap();

        let vary: Vec<_> = rec.header_snapshot().get_all(VARY).iter().collect();
        assert_eq!(vary, vec!["accept-encoding"]);
    }

    #[test]
    fn test_vary_appended_to_existing() {
        let handler = GzipHandler::new(handler_fn(|w, _req| w.write_all(b"x")));
        let mut rec = ResponseRecorder::new();
        rec.headers_mut().insert(VARY, HeaderValue::from_static("Origin"));
        handler.serve_http(&mut rec, &request(None, b"")).unwrap();

        let vary: Vec<_> = rec.header_snapshot().get_all(VARY).iter().collect();
        assert_eq!(vary, vec!["Origin", "Accept-Encoding"]);
    }

    #[test]
    fn test_handler_error_still_finalizes() {
        let pool = Arc::new(WriterPool::new());
        let handler = GzipHandler::with_config(
            handler_fn(|w, _req| {
                w.write_all(&test_body(600))?;
                Err(io::Error::other("handler gave up"))
            }),
            Config::new().pool(pool.clone()),
        );
        let mut rec = ResponseRecorder::new();
        let err = handler
            .serve_http(&mut rec, &request(Some("gzip"), b""))
            .unwrap_err();

        assert_eq!(err.to_string(), "handler gave up");
        assert_eq!(pool.idle(Level::DEFAULT), 1);
        assert_eq!(gunzip(rec.body()), test_body(600));
    }

    #[test]
    fn test_handler_panic_releases_compressor() {
        let pool = Arc::new(WriterPool::new());
        let handler = GzipHandler::with_config(
            handler_fn(|w, _req| {
                w.write_all(&test_body(600))?;
                panic!("handler exploded");
            }),
            Config::new().pool(pool.clone()),
        );

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut rec = ResponseRecorder::new();
            let _ = handler.serve_http(&mut rec, &request(Some("gzip"), b""));
        }));
        assert!(result.is_err());
        assert_eq!(pool.idle(Level::DEFAULT), 1);
    }

    #[test]
    fn test_push_through_middleware() {
        let handler = GzipHandler::new(handler_fn(|w, _req| {
            w.push("/app.js", Some(PushOptions::default()))
                .map_err(io::Error::from)?;
            w.write_all(b"<html></html>")
        }));
        let mut w = FullWriter::new();
        handler.serve_http(&mut w, &request(Some("gzip"), b"")).unwrap();

        assert_eq!(w.pushed()[0].1.headers[ACCEPT_ENCODING], "gzip");
        assert_eq!(w.body(), b"<html></html>");
    }

    #[test]
    fn test_capabilities_visible_without_gzip() {
        let handler = GzipHandler::new(handler_fn(|w, _req| {
            let caps = w.capabilities();
            assert!(caps.contains(crate::Capability::Hijack));
            Ok(())
        }));
        let mut w = FullWriter::new();
        handler.serve_http(&mut w, &request(None, b"")).unwrap();
    }

    #[test]
    fn test_concurrent_requests_share_pool() {
        let pool = Arc::new(WriterPool::new());
        let handler = Arc::new(GzipHandler::with_config(
            handler_fn(|w, req| w.write_all(req.body())),
            Config::new().min_size(0).pool(pool.clone()),
        ));

        let threads: Vec<_> = (0..8)
            .map(|n| {
                let handler = handler.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let body = format!("request {n}-{i} ").repeat(20);
                        let rec = serve(&handler, &request(Some("gzip"), body.as_bytes()));
                        assert_eq!(gunzip(rec.body()), body.as_bytes());
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert!(pool.idle(Level::DEFAULT) <= 8);
    }
}
