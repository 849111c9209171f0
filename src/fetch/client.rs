//! `reqwest`-backed fetcher.

use std::time::Duration;

use reqwest::redirect::Policy;
use url::Url;

use crate::config::FetchConfig;
use crate::fetch::{Fetch, FetchError, FetchOutcome, FetchRequest, FetchResult};

/// Fetches origin images over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    /// Build a fetcher with the configured timeouts and redirect limit.
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(Policy::limited(config.max_redirects))
            .no_proxy()
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout_secs)
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> FetchOutcome {
        let url = Url::parse(&request.url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let response = self
            .client
            .get(url)
            .headers(request.headers)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let headers = response.headers().clone();

        if !status.is_success() {
            return Ok(FetchResult {
                status,
                headers,
                body: Default::default(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        Ok(FetchResult {
            status,
            headers,
            body,
        })
    }
}
