//! Request orchestration: fetch → decide → compress → respond.

use std::sync::Arc;
use std::time::Instant;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use tokio::sync::Semaphore;

use crate::compression::{
    ChainSettings, CompressionPolicy, CompressionRequest, CompressionResult, FallbackChain,
    Outcome,
};
use crate::config::{CompressionConfig, FetchConfig, ProxyConfig};
use crate::fetch::{Fetch, FetchRequest};
use crate::http::response::ProxyResponse;
use crate::observability::metrics;
use crate::proxy::source::resolve_source_url;
use crate::proxy::{ProxyError, ProxyOptions, ProxyResult};
use crate::security::headers::{outbound_request_headers, strip_hop_by_hop};
use crate::security::{ClientContext, SecurityHeaders};

/// Body of the response to a request without `url`.
pub const WELCOME_BODY: &str = "bandwidth-hero-proxy";

/// Status used when the fetch produced no status of its own.
const FETCH_FAILURE_STATUS: StatusCode = StatusCode::FOUND;

/// Ties the fetcher, the compression policy and the fallback chain together.
pub struct Orchestrator<F> {
    fetcher: F,
    chain: FallbackChain,
    policy: CompressionPolicy,
    fetch_config: FetchConfig,
    compression_enabled: bool,
    security: SecurityHeaders,
    codec_permits: Arc<Semaphore>,
}

impl<F: Fetch> Orchestrator<F> {
    pub fn new(fetcher: F, config: &ProxyConfig) -> Self {
        Self::with_chain(
            fetcher,
            FallbackChain::new(ChainSettings::from(&config.compression)),
            config,
        )
    }

    /// Use an explicit fallback chain (custom codecs).
    pub fn with_chain(fetcher: F, chain: FallbackChain, config: &ProxyConfig) -> Self {
        let compression: &CompressionConfig = &config.compression;
        Self {
            fetcher,
            chain,
            policy: CompressionPolicy::from(compression),
            fetch_config: config.fetch.clone(),
            compression_enabled: compression.enabled,
            security: SecurityHeaders::new(&config.security),
            codec_permits: Arc::new(Semaphore::new(compression.max_concurrent_jobs.max(1))),
        }
    }

    /// Apply the server-wide compression switch to request options.
    pub fn effective_options(&self, mut options: ProxyOptions) -> ProxyOptions {
        if !self.compression_enabled {
            options.force_bypass_compression = true;
        }
        options
    }

    /// Handle one request. Always produces a response.
    pub async fn handle(
        &self,
        url_fragments: &[String],
        options: &ProxyOptions,
        client: &ClientContext,
    ) -> ProxyResponse {
        let mut response = match self.try_handle(url_fragments, options, client).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Request failed");
                ProxyResponse::text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        self.security.apply(&mut response.headers);
        response
            .headers
            .entry(header::CONTENT_ENCODING)
            .or_insert(HeaderValue::from_static("identity"));
        response
    }

    async fn try_handle(
        &self,
        url_fragments: &[String],
        options: &ProxyOptions,
        client: &ClientContext,
    ) -> ProxyResult<ProxyResponse> {
        // 1. Nothing to fetch
        let Some(url) = resolve_source_url(url_fragments) else {
            return Ok(ProxyResponse::text(StatusCode::OK, WELCOME_BODY));
        };

        // 2. Fetch
        let request = FetchRequest {
            url: url.clone(),
            headers: outbound_request_headers(client, &self.fetch_config),
        };
        let fetch_start = Instant::now();
        let fetched = match self.fetcher.fetch(request).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Origin fetch failed");
                metrics::record_fetch(FETCH_FAILURE_STATUS.as_u16(), fetch_start);
                return Ok(ProxyResponse::empty(FETCH_FAILURE_STATUS));
            }
        };
        metrics::record_fetch(fetched.status.as_u16(), fetch_start);

        if !fetched.status_ok() {
            tracing::info!(url = %url, status = %fetched.status, "Origin returned non-success status");
            return Ok(ProxyResponse::empty(fetched.status));
        }

        if fetched.body.is_empty() {
            tracing::info!(url = %url, "Origin returned an empty body");
            return Ok(ProxyResponse::text(
                StatusCode::BAD_REQUEST,
                "Origin returned an empty body; nothing to compress",
            ));
        }

        let original_size = fetched.body.len();
        let mut origin_headers = fetched.headers.clone();
        strip_hop_by_hop(&mut origin_headers);

        // 3. Decide
        let compress = !options.force_bypass_compression
            && self.policy.should_compress(
                fetched.content_type(),
                original_size,
                options.bypass_requested(),
            );

        if !compress {
            tracing::info!(
                url = %url,
                size = original_size,
                content_type = fetched.content_type().unwrap_or("-"),
                "Bypassing compression"
            );
            metrics::record_bypass();

            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("identity"));
            merge_headers(&mut headers, &origin_headers);
            return Ok(ProxyResponse::binary(StatusCode::OK, fetched.body, headers));
        }

        // 4. Compress
        let request = CompressionRequest::new(
            fetched.body,
            options.use_webp,
            options.grayscale,
            options.quality,
            original_size,
        );
        let result = self.compress(request).await?;

        if let Some(error) = result.error {
            return Err(ProxyError::Compression(error));
        }

        log_outcome(&url, original_size, &result);

        let mut headers = origin_headers;
        merge_headers(&mut headers, &result.headers.to_header_map());
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("identity"));

        Ok(ProxyResponse::binary(StatusCode::OK, result.output, headers))
    }

    /// Run the fallback chain on the blocking pool, bounded by the codec permits.
    async fn compress(&self, request: CompressionRequest) -> ProxyResult<CompressionResult> {
        let permit = self.codec_permits.clone().acquire_owned().await?;
        let chain = self.chain.clone();

        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            chain.compress(&request)
        })
        .await?;

        Ok(result)
    }
}

/// Copy `from` onto `into`. Names present in `from` replace those in `into`.
fn merge_headers(into: &mut HeaderMap, from: &HeaderMap) {
    for name in from.keys() {
        into.remove(name);
        for value in from.get_all(name) {
            into.append(name.clone(), value.clone());
        }
    }
}

fn log_outcome(url: &str, original_size: usize, result: &CompressionResult) {
    let output_size = result.output.len();
    let saved_ratio = if original_size == 0 {
        0.0
    } else {
        result.bytes_saved() as f64 / original_size as f64
    };

    match &result.outcome {
        Outcome::Transformed { strategy, quality } => {
            tracing::info!(
                url = %url,
                strategy = %strategy,
                quality = *quality,
                original_size,
                output_size,
                saved_ratio,
                "Compressed"
            );
            metrics::record_compression(result.outcome.label(), strategy.as_str(), result.bytes_saved());
        }
        Outcome::Degraded(reason) => {
            tracing::warn!(
                url = %url,
                reason = ?reason,
                original_size,
                "Compression degraded to original bytes"
            );
            metrics::record_compression(result.outcome.label(), "none", 0);
        }
    }
}
