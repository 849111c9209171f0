//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, handler)
//!     → request.rs (request ID)
//!     → query.rs (raw query → QueryParams)
//!     → [proxy orchestrator]
//!     → response.rs (ProxyResponse → wire response)
//!     → Send to client
//! ```

pub mod query;
pub mod request;
pub mod response;
pub mod server;

pub use query::QueryParams;
pub use request::X_REQUEST_ID;
pub use response::{ProxyResponse, ResponseBody};
pub use server::HttpServer;
