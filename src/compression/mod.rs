//! Adaptive compression subsystem.
//!
//! # Data Flow
//! ```text
//! fetched bytes
//!     → policy.rs (is transcoding worth attempting?)
//!     → chain.rs (fallback ladder over codec strategies)
//!         → primary.rs   (image decode, jpeg-encoder / libwebp encode)
//!         → alternate.rs (zune-jpeg decode, baseline JPEG encode)
//!     → CompressionResult (transformed bytes, or the original on degrade)
//! ```
//!
//! # Design Decisions
//! - Codec failures never leave this module; the worst case is the original bytes
//! - Thresholds and quality defaults arrive through configuration, not globals
//! - All work here is synchronous; the proxy runs it on the blocking pool

pub mod alternate;
pub mod chain;
pub mod codec;
pub mod policy;
pub mod primary;
pub mod types;

pub use chain::{sniff_content_type, ChainSettings, FallbackChain, Strategy};
pub use codec::{CodecError, DecodeMode, Encoded, ImageCodec, OutputFormat, TranscodeOptions};
pub use policy::{should_compress, CompressionPolicy};
pub use types::{
    CompressionRequest, CompressionResult, DegradeReason, Outcome, PayloadHeaders,
    X_BYTES_SAVED, X_ORIGINAL_SIZE,
};
