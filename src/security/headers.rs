//! Header manipulation and security headers.
//!
//! # Responsibilities
//! - Build the allow-listed outbound request headers (cookie, dnt, referer)
//! - Add X-Forwarded-For, User-Agent and Via to origin requests
//! - Strip hop-by-hop headers from origin responses
//! - Add the static CORS / embedding policy headers to every response
//!
//! # Design Decisions
//! - Inbound headers cross to the origin only through the allow-list
//! - Preserve original client IP in X-Forwarded-For
//! - Security headers are applied last and win over origin values

use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::{FetchConfig, SecurityConfig};

/// Caller headers forwarded to the origin.
pub const FORWARDED_REQUEST_HEADERS: [HeaderName; 3] =
    [header::COOKIE, header::DNT, header::REFERER];

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const CROSS_ORIGIN_EMBEDDER_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-embedder-policy");
const CROSS_ORIGIN_OPENER_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-opener-policy");

/// Connection-scoped headers never copied from the origin response.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// What is known about the caller of one request.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    /// Inbound request headers, as received.
    pub headers: HeaderMap,
    /// Peer address of the connection.
    pub remote_ip: Option<IpAddr>,
}

impl ClientContext {
    pub fn new(headers: HeaderMap, remote_ip: Option<IpAddr>) -> Self {
        Self { headers, remote_ip }
    }

    /// Incoming X-Forwarded-For, falling back to the peer address.
    pub fn forwarded_for(&self) -> Option<HeaderValue> {
        if let Some(value) = self.headers.get(&X_FORWARDED_FOR) {
            return Some(value.clone());
        }
        self.remote_ip
            .and_then(|ip| HeaderValue::from_str(&ip.to_string()).ok())
    }
}

/// Headers sent to the origin for a caller.
pub fn outbound_request_headers(client: &ClientContext, fetch: &FetchConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for name in FORWARDED_REQUEST_HEADERS.iter() {
        for value in client.headers.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    if let Ok(user_agent) = HeaderValue::from_str(&fetch.user_agent) {
        headers.insert(header::USER_AGENT, user_agent);
    }
    if let Some(forwarded_for) = client.forwarded_for() {
        headers.insert(X_FORWARDED_FOR, forwarded_for);
    }
    if let Ok(via) = HeaderValue::from_str(&fetch.via) {
        headers.insert(header::VIA, via);
    }

    headers
}

/// Remove connection-scoped headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

/// Static CORS and embedding headers.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    content_security_policy: HeaderValue,
}

impl SecurityHeaders {
    pub fn new(config: &SecurityConfig) -> Self {
        let content_security_policy = HeaderValue::from_str(&config.content_security_policy)
            .unwrap_or_else(|_| {
                tracing::warn!("Invalid content_security_policy, falling back to default");
                HeaderValue::from_static("default-src 'none'")
            });
        Self {
            content_security_policy,
        }
    }

    /// The policy headers as name/value pairs.
    pub fn pairs(&self) -> [(HeaderName, HeaderValue); 4] {
        [
            (
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ),
            (
                header::CONTENT_SECURITY_POLICY,
                self.content_security_policy.clone(),
            ),
            (
                CROSS_ORIGIN_EMBEDDER_POLICY,
                HeaderValue::from_static("require-corp"),
            ),
            (
                CROSS_ORIGIN_OPENER_POLICY,
                HeaderValue::from_static("same-origin"),
            ),
        ]
    }

    /// Overwrite the policy headers on `headers`.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in self.pairs() {
            headers.insert(name, value);
        }
    }
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self::new(&SecurityConfig::default())
    }
}
