//! Per-request compression options derived from the query string.

use crate::compression::codec::clamp_quality;
use crate::http::query::QueryParams;

/// Options for one proxied request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyOptions {
    /// Encode WebP. Set by the *absence* of `jpeg`; the inversion is part of
    /// the public query contract.
    pub use_webp: bool,
    /// Pass every payload through untouched.
    pub force_bypass_compression: bool,
    pub grayscale: bool,
    /// Within 1..=100.
    pub quality: u8,
}

impl ProxyOptions {
    /// Derive options from query parameters.
    ///
    /// - `jpeg` present → `use_webp = false`
    /// - `bw=0` → color; any other value or absence → grayscale
    /// - `l` outside 1..=100 or not an integer → `default_quality`
    pub fn from_query(params: &QueryParams, default_quality: u8) -> Self {
        Self {
            use_webp: params.jpeg.is_none(),
            force_bypass_compression: false,
            grayscale: params.bw.as_deref() != Some("0"),
            quality: parse_quality(params.l.as_deref(), default_quality),
        }
    }

    /// Bypass flag handed to the compression policy.
    pub fn bypass_requested(&self) -> bool {
        !self.use_webp
    }
}

fn parse_quality(raw: Option<&str>, default_quality: u8) -> u8 {
    raw.and_then(|l| l.trim().parse::<i64>().ok())
        .filter(|q| (1..=100).contains(q))
        .map(|q| q as u8)
        .unwrap_or_else(|| clamp_quality(default_quality))
}
