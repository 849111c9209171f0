//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! query string
//!     → options.rs (jpeg / bw / l → ProxyOptions)
//!     → source.rs (url fragments → normalized origin URL)
//!     → orchestrator.rs
//!         → fetch (origin bytes + headers)
//!         → compression policy (transcode or bypass?)
//!         → fallback chain on the blocking pool
//!     → ProxyResponse (+ security headers)
//! ```
//!
//! # Design Decisions
//! - Every request gets a response; internal faults become a 500 with the message as body
//! - Codec work is bounded by a semaphore so a burst of large images cannot starve the runtime
//! - Origin headers are forwarded minus hop-by-hop fields; payload headers win over origin ones

pub mod options;
pub mod orchestrator;
pub mod source;

use thiserror::Error;

pub use options::ProxyOptions;
pub use orchestrator::{Orchestrator, WELCOME_BODY};
pub use source::resolve_source_url;

/// Faults that turn a request into a 500.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The compression job could not get a codec permit.
    #[error("compression queue closed: {0}")]
    Concurrency(#[from] tokio::sync::AcquireError),

    /// The blocking compression task panicked or was cancelled.
    #[error("compression task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The fallback chain reported that it produced nothing.
    #[error("compression failed: {0}")]
    Compression(String),
}

/// Result type for orchestration.
pub type ProxyResult<T> = Result<T, ProxyError>;
