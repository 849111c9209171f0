//! Outbound fetch subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator
//!     → FetchRequest (url + allow-listed headers)
//!     → client.rs (reqwest, bounded by fetch timeout)
//!     → FetchResult (status, headers, body) | FetchError
//! ```
//!
//! # Design Decisions
//! - No retries here; a failed fetch is answered immediately
//! - The pooled client keeps no cookie store, so caller headers never outlive a request
//! - Error statuses are returned as results, not errors; only transport faults are errors

pub mod client;

use std::future::Future;

use axum::http::{header, HeaderMap, StatusCode};
use bytes::Bytes;
use thiserror::Error;

pub use client::HttpFetcher;

/// Outbound GET request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub headers: HeaderMap,
}

/// Response from the origin.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Empty when the status is not a success.
    pub body: Bytes,
}

impl FetchResult {
    pub fn status_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Errors that can occur while fetching from the origin.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed or uses an unsupported scheme.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The origin did not answer within the fetch timeout.
    #[error("fetch timed out after {0} seconds")]
    Timeout(u64),

    /// Connection, TLS, redirect or body read failure.
    #[error("fetch failed: {0}")]
    Transport(String),
}

/// Result type for fetch operations.
pub type FetchOutcome = Result<FetchResult, FetchError>;

/// A "GET bytes and headers from a URL" capability.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, request: FetchRequest) -> impl Future<Output = FetchOutcome> + Send;
}
