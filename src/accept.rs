//! `Accept-Encoding` negotiation.

use http::HeaderMap;
use http::header::ACCEPT_ENCODING;

/// One entry of an `Accept-Encoding` preference list.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEncoding {
    /// The content-coding token, lowercased.
    pub coding: String,
    /// The quality weight; `1.0` when absent.
    pub quality: f32,
}

/// Parses every `Accept-Encoding` header line into an ordered preference list.
///
/// Header values that are not visible ASCII are skipped.
pub fn parse_accept_encoding(headers: &HeaderMap) -> Vec<AcceptEncoding> {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|part| {
            let (coding, quality) = parse_encoding_with_quality(part.trim());
            (!coding.is_empty()).then(|| AcceptEncoding {
                coding: coding.to_ascii_lowercase(),
                quality,
            })
        })
        .collect()
}

/// Returns true when the client lists `gzip` with a non-zero weight.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    parse_accept_encoding(headers)
        .iter()
        .any(|entry| entry.coding == "gzip" && entry.quality > 0.0)
}

/// Parses an encoding entry like "gzip" or "br;q=0.8" into (encoding, quality).
fn parse_encoding_with_quality(s: &str) -> (&str, f32) {
    let mut parts = s.split(';');
    let encoding = parts.next().unwrap_or("").trim();

    let quality = parts
        .find_map(|param| {
            let param = param.trim();
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("q")
                .then(|| value.trim().parse::<f32>().ok())
                .flatten()
        })
        .unwrap_or(1.0);

    (encoding, quality)
}
