//! Bandwidth-hero image compression proxy.
//!
//! Fetches an image on behalf of a client, re-encodes it smaller (WebP or
//! JPEG, optionally grayscale, at a requested quality) and streams the
//! result back. When a codec fails, a fallback ladder retries with more
//! defensive options and, as a last resort, returns the original bytes.

// Core subsystems
pub mod compression;
pub mod config;
pub mod fetch;
pub mod http;
pub mod proxy;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
