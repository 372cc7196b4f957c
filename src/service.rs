use crate::handler::Handler;
use crate::recorder::ResponseRecorder;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::future::{Ready, ready};
use std::io;
use std::task::{Context, Poll};
use tower::Service;

/// A Tower service that runs a [`Handler`] against an in-memory response.
///
/// The handler writes into a [`ResponseRecorder`], which becomes the
/// response once the handler returns. Handlers are synchronous, so the
/// service is always ready.
#[derive(Debug, Clone)]
pub struct HandlerService<H> {
    inner: H,
}

impl<H> HandlerService<H> {
    /// Creates a new service wrapping the given handler.
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    /// Returns a reference to the inner handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Returns a mutable reference to the inner handler.
    pub fn inner_mut(&mut self) -> &mut H {
        &mut self.inner
    }

    /// Consumes this service, returning the inner handler.
    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: Handler> Service<Request<Bytes>> for HandlerService<H> {
    type Response = Response<Full<Bytes>>;
    type Error = io::Error;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Bytes>) -> Self::Future {
        let mut rec = ResponseRecorder::new();
        let res = self
            .inner
            .serve_http(&mut rec, &req)
            .map(|()| rec.into_response());
        ready(res)
    }
}
