//! Decides whether a fetched payload is worth transcoding.

use crate::config::CompressionConfig;

/// Payloads smaller than this are not worth the transcode overhead.
pub const MIN_COMPRESS_LENGTH: usize = 1024;

/// Below this size a bypass request is honoured; small images may rely on alpha.
pub const MIN_TRANSPARENT_COMPRESS_LENGTH: usize = 102_400;

/// Size thresholds for the compression decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPolicy {
    pub min_compress_length: usize,
    pub min_transparent_compress_length: usize,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            min_compress_length: MIN_COMPRESS_LENGTH,
            min_transparent_compress_length: MIN_TRANSPARENT_COMPRESS_LENGTH,
        }
    }
}

impl From<&CompressionConfig> for CompressionPolicy {
    fn from(config: &CompressionConfig) -> Self {
        Self {
            min_compress_length: config.min_compress_length,
            min_transparent_compress_length: config.min_transparent_compress_length,
        }
    }
}

impl CompressionPolicy {
    /// Returns true when transcoding should be attempted.
    ///
    /// Total over its inputs: a missing or malformed content type is simply
    /// "not an image".
    pub fn should_compress(
        &self,
        content_type: Option<&str>,
        byte_size: usize,
        bypass_requested: bool,
    ) -> bool {
        let Some(subtype) = content_type.and_then(image_subtype) else {
            return false;
        };

        if byte_size == 0 {
            return false;
        }

        if bypass_requested && byte_size < self.min_transparent_compress_length {
            return false;
        }

        if !bypass_requested
            && compresses_poorly(&subtype)
            && byte_size < self.min_compress_length
        {
            return false;
        }

        true
    }
}

/// [`CompressionPolicy::should_compress`] with the default thresholds.
pub fn should_compress(content_type: Option<&str>, byte_size: usize, bypass_requested: bool) -> bool {
    CompressionPolicy::default().should_compress(content_type, byte_size, bypass_requested)
}

/// Lower-cased subtype of an `image/*` media type, parameters stripped.
fn image_subtype(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let subtype = essence.strip_prefix("image/")?;
    if subtype.is_empty() {
        return None;
    }
    Some(subtype.to_string())
}

fn compresses_poorly(subtype: &str) -> bool {
    matches!(subtype, "png" | "gif" | "apng")
}
