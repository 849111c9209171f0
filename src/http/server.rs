//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the compression handler
//! - Wire up middleware (timeout, request ID, tracing, baseline headers)
//! - Bind server to listener
//! - Translate HTTP requests into orchestrator calls
//! - Observability (metrics, correlation IDs)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, RawQuery, State},
    http::{header, HeaderMap, HeaderValue, Request},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::fetch::{FetchError, HttpFetcher};
use crate::http::query::QueryParams;
use crate::http::request::{self, propagate_request_id_layer, set_request_id_layer};
use crate::observability::metrics;
use crate::proxy::{Orchestrator, ProxyOptions};
use crate::security::{ClientContext, SecurityHeaders};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator<HttpFetcher>>,
    pub default_quality: u8,
}

/// HTTP server for the compression proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        let state = AppState {
            orchestrator: Arc::new(Orchestrator::new(fetcher, &config)),
            default_quality: config.compression.default_quality,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %request::request_id(req.headers()),
            )
        });

        let mut router = Router::new()
            .route("/", get(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        // Responses produced by the timeout layer never reach the orchestrator.
        let baseline = SecurityHeaders::new(&config.security).pairs().into_iter().chain([(
            header::CONTENT_ENCODING,
            HeaderValue::from_static("identity"),
        )]);
        for (name, value) in baseline {
            router = router.layer(SetResponseHeaderLayer::if_not_present(name, value));
        }

        router
            .layer(propagate_request_id_layer())
            .layer(trace)
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            compression_enabled = self.config.compression.enabled,
            webp_enabled = self.config.compression.webp_enabled,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// `GET /?url=...&jpeg=...&bw=...&l=...`
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    let request_id = request::request_id(&headers).to_string();

    let params = QueryParams::parse(query.as_deref());
    let options = state
        .orchestrator
        .effective_options(ProxyOptions::from_query(&params, state.default_quality));

    tracing::debug!(
        request_id = %request_id,
        url_fragments = params.urls.len(),
        use_webp = options.use_webp,
        grayscale = options.grayscale,
        quality = options.quality,
        "Handling request"
    );

    let client = ClientContext::new(headers, Some(addr.ip()));
    let response = state.orchestrator.handle(&params.urls, &options, &client).await;

    metrics::record_request(response.status.as_u16(), start_time);
    response.into_response()
}
