//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached by middleware and shows up in every HTTP span
//! - Metric updates are fire-and-forget; without an installed recorder they are no-ops
//! - Log level comes from config unless RUST_LOG is set

pub mod logging;
pub mod metrics;
