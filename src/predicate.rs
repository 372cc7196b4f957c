//! Compressibility predicates over response headers.

use http::header::{self, HeaderMap};
use std::sync::Arc;

/// Decides from the response headers whether a response should be compressed.
///
/// Evaluated once per response, when the gzip writer commits to a path.
pub type CanCompress = Arc<dyn Fn(&HeaderMap) -> bool + Send + Sync>;

/// A predicate that skips content which does not benefit from gzip.
///
/// Returns false for range responses, images other than SVG, and gRPC
/// payloads other than gRPC-web.
pub fn compressible_content(headers: &HeaderMap) -> bool {
    !has_content_range(headers) && !is_uncompressible_content_type(headers)
}

/// Checks if Content-Encoding header is already present.
pub(crate) fn has_content_encoding(headers: &HeaderMap) -> bool {
    headers.contains_key(header::CONTENT_ENCODING)
}

/// Checks if Content-Range header is present (range response).
fn has_content_range(headers: &HeaderMap) -> bool {
    headers.contains_key(header::CONTENT_RANGE)
}

/// Checks if the content type should not be compressed.
fn is_uncompressible_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    // Skip all images except SVG
    if content_type.starts_with("image/") {
        return !content_type.starts_with("image/svg+xml");
    }

    // Skip gRPC except grpc-web
    if content_type.starts_with("application/grpc") {
        return !content_type.starts_with("application/grpc-web");
    }

    false
}
