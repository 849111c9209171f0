//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the compression proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Outbound fetch settings.
    pub fetch: FetchConfig,

    /// Compression policy and fallback chain settings.
    pub compression: CompressionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Response header hardening.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for fetch, compression and response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Outbound fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Upstream fetch timeout in seconds. A timeout is treated as a fetch failure.
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// User-Agent sent to the origin.
    pub user_agent: String,

    /// Value of the `via` header sent to the origin.
    pub via: String,

    /// Maximum number of redirects followed.
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 5,
            user_agent: "Bandwidth-Hero Compressor".to_string(),
            via: "1.1 bandwidth-hero".to_string(),
            max_redirects: 5,
        }
    }
}

/// Compression policy and fallback chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// When false every image is passed through untouched.
    pub enabled: bool,

    /// Opt-in WebP output. When false the controller emits JPEG even if
    /// WebP was requested, matching legacy clients.
    pub webp_enabled: bool,

    /// Quality applied when the caller gives none or an unusable one.
    pub default_quality: u8,

    /// PNG/GIF payloads below this size are not worth transcoding.
    pub min_compress_length: usize,

    /// Payloads below this size are left alone when the caller asked for bypass.
    pub min_transparent_compress_length: usize,

    /// Hard ceiling on decoded pixel count (width * height).
    pub max_pixels: u64,

    /// Longest side used by the safety-downscale retry.
    pub safety_max_dimension: u32,

    /// Quality reduction used when the first output is not smaller than the input.
    pub quality_step: u8,

    /// Maximum number of codec jobs running at once.
    pub max_concurrent_jobs: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webp_enabled: false,
            default_quality: 40,
            min_compress_length: 1024,
            min_transparent_compress_length: 102_400,
            max_pixels: 268_402_689, // 16383 x 16383
            safety_max_dimension: 4096,
            quality_step: 10,
            max_concurrent_jobs: 8,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Response header hardening.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Content-Security-Policy attached to every response.
    pub content_security_policy: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            content_security_policy: "default-src 'none'; img-src 'self' data:; style-src 'none'; script-src 'none'; frame-ancestors 'none'".to_string(),
        }
    }
}
