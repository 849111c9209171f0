//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing origin request:
//!     → headers.rs (allow-list caller headers, add X-Forwarded-For / Via)
//!
//! Response to caller:
//!     → headers.rs (strip hop-by-hop, add CORS / CSP / COEP / COOP)
//! ```
//!
//! # Design Decisions
//! - No trust in client input: only allow-listed headers reach the origin
//! - Policy headers are static and independent of the compression outcome

pub mod headers;

pub use headers::{ClientContext, SecurityHeaders};
