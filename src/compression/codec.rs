//! Codec adapter seam.
//!
//! # Responsibilities
//! - Describe one decode → transform → encode attempt ([`TranscodeOptions`])
//! - Define the [`ImageCodec`] trait implemented by each image library backend
//! - Classify codec failures so the fallback chain can pick the next step
//!
//! # Design Decisions
//! - A codec performs exactly one attempt; it knows nothing about retries
//! - Attempts are synchronous and CPU-bound; callers move them off the runtime

use std::fmt;

use thiserror::Error;

/// Output encoding of a transcode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    WebP,
}

impl OutputFormat {
    /// MIME type written to `content-type`.
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jpeg => f.write_str("jpeg"),
            OutputFormat::WebP => f.write_str("webp"),
        }
    }
}

/// How the source bytes are read by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Whole-buffer decode with format sniffing.
    Buffered,
    /// Decoder driven through a small read buffer with a tighter allocation budget.
    Sequential,
}

/// Options for a single transcode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub format: OutputFormat,
    pub grayscale: bool,
    /// Encoder quality, already clamped to 1..=100.
    pub quality: u8,
    pub decode_mode: DecodeMode,
    /// Fit the decoded image inside this box before encoding. Never upscales.
    pub max_dimension: Option<u32>,
    /// Images with more pixels than this are rejected before decoding.
    pub max_pixels: u64,
}

impl TranscodeOptions {
    pub fn with_quality(&self, quality: u8) -> Self {
        Self {
            quality: clamp_quality(quality),
            ..self.clone()
        }
    }
}

/// Clamp an encoder quality into 1..=100.
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(1, 100)
}

/// Encoded output of a successful attempt.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Failure of a single codec attempt.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Source exceeds the pixel ceiling.
    #[error("image of {width}x{height} exceeds the {max_pixels} pixel limit")]
    PixelLimit {
        width: u32,
        height: u32,
        max_pixels: u64,
    },

    /// Source could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// This codec cannot handle the source at all.
    #[error("unsupported input: {0}")]
    Unsupported(String),

    /// Decoded pixels could not be encoded in the target format.
    #[error("{format} encode failed: {reason}")]
    Encode { format: OutputFormat, reason: String },

    /// The codec panicked; the attempt is abandoned.
    #[error("codec panicked: {0}")]
    Panicked(String),
}

impl CodecError {
    /// True when the failing step was WebP encoding.
    pub fn is_webp_encode(&self) -> bool {
        matches!(
            self,
            CodecError::Encode {
                format: OutputFormat::WebP,
                ..
            }
        )
    }
}

/// Result type for codec attempts.
pub type CodecResult<T> = Result<T, CodecError>;

/// One image-processing backend.
pub trait ImageCodec: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Decode `input`, apply the requested transform and encode it.
    fn transcode(&self, input: &[u8], options: &TranscodeOptions) -> CodecResult<Encoded>;
}

/// Reject images whose pixel count exceeds `max_pixels`.
pub fn check_pixel_limit(width: u32, height: u32, max_pixels: u64) -> CodecResult<()> {
    if u64::from(width) * u64::from(height) > max_pixels {
        return Err(CodecError::PixelLimit {
            width,
            height,
            max_pixels,
        });
    }
    Ok(())
}

/// Dimensions that fit `(width, height)` inside a `max` box, keeping aspect ratio.
///
/// Returns `None` when the image already fits.
pub fn fit_within(width: u32, height: u32, max: u32) -> Option<(u32, u32)> {
    if width <= max && height <= max {
        return None;
    }
    let ratio = (max as f64 / width as f64).min(max as f64 / height as f64);
    let new_width = ((width as f64 * ratio).round() as u32).clamp(1, max);
    let new_height = ((height as f64 * ratio).round() as u32).clamp(1, max);
    Some((new_width, new_height))
}

/// Reject a JPEG stream that ends before its end-of-image marker.
///
/// Decoders fill missing scanlines with grey instead of failing, so a cut-off
/// download would otherwise come back "compressed". Non-JPEG input passes.
pub fn check_jpeg_complete(data: &[u8]) -> CodecResult<()> {
    if !data.starts_with(&[0xFF, 0xD8]) || jpeg_has_end_marker(data) {
        return Ok(());
    }
    Err(CodecError::Decode(
        "truncated JPEG: stream ends before the end-of-image marker".into(),
    ))
}

/// Walk the marker segments from SOI and report whether EOI is reached.
fn jpeg_has_end_marker(data: &[u8]) -> bool {
    let mut pos = 2;
    loop {
        while pos < data.len() && data[pos] != 0xFF {
            pos += 1;
        }
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        let Some(&marker) = data.get(pos) else {
            return false;
        };
        pos += 1;

        match marker {
            0xD9 => return true,
            // standalone markers carry no length
            0x01 | 0xD0..=0xD7 => continue,
            _ => {}
        }

        let Some(length) = data.get(pos..pos + 2) else {
            return false;
        };
        let length = u16::from_be_bytes([length[0], length[1]]) as usize;
        if length < 2 || pos + length > data.len() {
            return false;
        }
        pos += length;

        if marker == 0xDA {
            // Entropy-coded data runs until a marker that is neither a
            // stuffed zero, a restart marker nor fill.
            loop {
                while pos < data.len() && data[pos] != 0xFF {
                    pos += 1;
                }
                match data.get(pos + 1) {
                    None => return false,
                    Some(0x00) | Some(0xD0..=0xD7) => pos += 2,
                    Some(0xFF) => pos += 1,
                    Some(_) => break,
                }
            }
        }
    }
}
