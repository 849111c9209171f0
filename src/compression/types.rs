//! Request and result values exchanged with the fallback chain.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use bytes::Bytes;

use crate::compression::codec::{clamp_quality, CodecError};
use crate::compression::Strategy;

pub const X_ORIGINAL_SIZE: HeaderName = HeaderName::from_static("x-original-size");
pub const X_BYTES_SAVED: HeaderName = HeaderName::from_static("x-bytes-saved");

/// One compression job.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub source: Bytes,
    pub want_webp: bool,
    pub want_grayscale: bool,
    /// Always within 1..=100, see [`CompressionRequest::new`].
    pub quality: u8,
    pub original_size: usize,
}

impl CompressionRequest {
    /// Build a request, clamping `quality` into 1..=100.
    pub fn new(
        source: Bytes,
        want_webp: bool,
        want_grayscale: bool,
        quality: u8,
        original_size: usize,
    ) -> Self {
        Self {
            source,
            want_webp,
            want_grayscale,
            quality: clamp_quality(quality),
            original_size,
        }
    }
}

/// Why the chain fell back to the original bytes.
#[derive(Debug, Clone)]
pub enum DegradeReason {
    /// Every strategy failed; the last error is kept.
    Exhausted(CodecError),
    /// A strategy succeeded but the output never got smaller than the input.
    NoSavings { best_output_size: usize },
}

/// What produced the bytes in a [`CompressionResult`].
#[derive(Debug, Clone)]
pub enum Outcome {
    Transformed { strategy: Strategy, quality: u8 },
    Degraded(DegradeReason),
}

impl Outcome {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Transformed { .. } => "transformed",
            Outcome::Degraded(DegradeReason::Exhausted(_)) => "degraded_exhausted",
            Outcome::Degraded(DegradeReason::NoSavings { .. }) => "degraded_no_savings",
        }
    }
}

/// Headers describing the payload the controller produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadHeaders {
    pub content_type: String,
    pub content_length: usize,
    pub original_size: usize,
    pub bytes_saved: i64,
}

impl PayloadHeaders {
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(self.content_length));
        headers.insert(X_ORIGINAL_SIZE, HeaderValue::from(self.original_size));
        headers.insert(X_BYTES_SAVED, HeaderValue::from(self.bytes_saved));
        headers
    }
}

/// Result of [`crate::compression::FallbackChain::compress`].
#[derive(Debug, Clone)]
pub struct CompressionResult {
    /// Set only when the chain itself could not produce any bytes.
    pub error: Option<String>,
    pub output: Bytes,
    pub headers: PayloadHeaders,
    pub outcome: Outcome,
}

impl CompressionResult {
    pub fn is_transformed(&self) -> bool {
        matches!(self.outcome, Outcome::Transformed { .. })
    }

    pub fn bytes_saved(&self) -> i64 {
        self.headers.bytes_saved
    }
}
