//! Fallback chain controller.
//!
//! Runs codec attempts down a fixed ladder of increasingly defensive
//! strategies and degrades to the original bytes when all of them fail.
//!
//! ```text
//! Primary ──err──▶ Sequential ──err──▶ Downscale ──err──▶ FormatDowngrade* ──err──▶ AlternateCodec ──err──▶ degrade
//!    │                 │                   │                    │                        │
//!    └──────ok─────────┴────────ok─────────┴─────────ok─────────┴───────────ok───────────┴──▶ size check
//!
//! * only after a WebP encode failure
//! ```
//!
//! Downscale still decodes the whole image before resizing, so it cannot
//! rescue a decode failure. It exists for encode-side limits: outputs too
//! large for the target format or for the encoder's memory.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::compression::alternate::AlternateCodec;
use crate::compression::codec::{
    clamp_quality, CodecError, CodecResult, DecodeMode, Encoded, ImageCodec, OutputFormat,
    TranscodeOptions,
};
use crate::compression::primary::PrimaryCodec;
use crate::compression::types::{
    CompressionRequest, CompressionResult, DegradeReason, Outcome, PayloadHeaders,
};
use crate::config::CompressionConfig;

/// One rung of the fallback ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Primary,
    Sequential,
    Downscale,
    FormatDowngrade,
    AlternateCodec,
}

impl Strategy {
    /// Evaluation order.
    pub const LADDER: [Strategy; 5] = [
        Strategy::Primary,
        Strategy::Sequential,
        Strategy::Downscale,
        Strategy::FormatDowngrade,
        Strategy::AlternateCodec,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Primary => "primary",
            Strategy::Sequential => "sequential",
            Strategy::Downscale => "downscale",
            Strategy::FormatDowngrade => "format_downgrade",
            Strategy::AlternateCodec => "alternate_codec",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables of the ladder, taken from [`CompressionConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSettings {
    pub max_pixels: u64,
    pub safety_max_dimension: u32,
    pub quality_step: u8,
    pub webp_enabled: bool,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self::from(&CompressionConfig::default())
    }
}

impl From<&CompressionConfig> for ChainSettings {
    fn from(config: &CompressionConfig) -> Self {
        Self {
            max_pixels: config.max_pixels,
            safety_max_dimension: config.safety_max_dimension,
            quality_step: config.quality_step,
            webp_enabled: config.webp_enabled,
        }
    }
}

/// Fallback chain over a primary and an optional alternate codec.
///
/// Cheap to clone; codecs are shared.
#[derive(Clone)]
pub struct FallbackChain {
    primary: Arc<dyn ImageCodec>,
    alternate: Option<Arc<dyn ImageCodec>>,
    settings: ChainSettings,
}

impl fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackChain")
            .field("primary", &self.primary.name())
            .field("alternate", &self.alternate.as_ref().map(|c| c.name()))
            .field("settings", &self.settings)
            .finish()
    }
}

impl FallbackChain {
    /// Chain over the built-in codecs.
    pub fn new(settings: ChainSettings) -> Self {
        Self::with_codecs(
            Arc::new(PrimaryCodec::new()),
            Some(Arc::new(AlternateCodec::new()) as Arc<dyn ImageCodec>),
            settings,
        )
    }

    /// Chain over explicit codecs. Without an alternate codec that rung is
    /// skipped and the chain goes straight to the degrade step.
    pub fn with_codecs(
        primary: Arc<dyn ImageCodec>,
        alternate: Option<Arc<dyn ImageCodec>>,
        settings: ChainSettings,
    ) -> Self {
        Self {
            primary,
            alternate,
            settings,
        }
    }

    /// Compress `request.source`. Never fails: the worst case is the original bytes.
    pub fn compress(&self, request: &CompressionRequest) -> CompressionResult {
        let format = if request.want_webp && self.settings.webp_enabled {
            OutputFormat::WebP
        } else {
            OutputFormat::Jpeg
        };
        let base = TranscodeOptions {
            format,
            grayscale: request.want_grayscale,
            quality: clamp_quality(request.quality),
            decode_mode: DecodeMode::Buffered,
            max_dimension: None,
            max_pixels: self.settings.max_pixels,
        };

        let mut webp_encode_failed = false;
        let mut last_error = None;

        for strategy in Strategy::LADDER {
            let Some((codec, options)) = self.plan(strategy, &base, webp_encode_failed) else {
                continue;
            };

            match run_attempt(codec.as_ref(), &request.source, &options) {
                Ok(encoded) => {
                    return self.finish(request, strategy, codec.as_ref(), &options, encoded);
                }
                Err(e) => {
                    tracing::debug!(
                        strategy = %strategy,
                        codec = codec.name(),
                        error = %e,
                        "Codec attempt failed"
                    );
                    webp_encode_failed |= e.is_webp_encode();
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| CodecError::Unsupported("no codec strategy applicable".into()));
        tracing::warn!(error = %error, size = request.source.len(), "All codec strategies failed, returning original");
        degrade(request, DegradeReason::Exhausted(error))
    }

    /// Codec and options for `strategy`, or `None` when the rung does not apply.
    fn plan(
        &self,
        strategy: Strategy,
        base: &TranscodeOptions,
        webp_encode_failed: bool,
    ) -> Option<(Arc<dyn ImageCodec>, TranscodeOptions)> {
        let primary = self.primary.clone();
        match strategy {
            Strategy::Primary => Some((primary, base.clone())),
            Strategy::Sequential => Some((
                primary,
                TranscodeOptions {
                    decode_mode: DecodeMode::Sequential,
                    ..base.clone()
                },
            )),
            Strategy::Downscale => Some((
                primary,
                TranscodeOptions {
                    max_dimension: Some(self.settings.safety_max_dimension),
                    ..base.clone()
                },
            )),
            Strategy::FormatDowngrade => {
                if base.format != OutputFormat::WebP || !webp_encode_failed {
                    return None;
                }
                Some((
                    primary,
                    TranscodeOptions {
                        format: OutputFormat::Jpeg,
                        ..base.clone()
                    },
                ))
            }
            Strategy::AlternateCodec => self.alternate.clone().map(|codec| {
                (
                    codec,
                    TranscodeOptions {
                        format: OutputFormat::Jpeg,
                        ..base.clone()
                    },
                )
            }),
        }
    }

    /// Accept `encoded` if it is smaller than the original, otherwise retry
    /// once at a lower quality before giving up on savings.
    fn finish(
        &self,
        request: &CompressionRequest,
        strategy: Strategy,
        codec: &dyn ImageCodec,
        options: &TranscodeOptions,
        encoded: Encoded,
    ) -> CompressionResult {
        if encoded.bytes.len() < request.original_size {
            return transformed(request, strategy, options.quality, encoded);
        }

        let mut best_output_size = encoded.bytes.len();
        let lowered = options.quality.saturating_sub(self.settings.quality_step).max(1);
        if lowered < options.quality {
            tracing::debug!(
                strategy = %strategy,
                output_size = encoded.bytes.len(),
                original_size = request.original_size,
                quality = lowered,
                "Output not smaller than original, retrying at lower quality"
            );
            let retry = options.with_quality(lowered);
            match run_attempt(codec, &request.source, &retry) {
                Ok(encoded) if encoded.bytes.len() < request.original_size => {
                    return transformed(request, strategy, lowered, encoded);
                }
                Ok(encoded) => best_output_size = best_output_size.min(encoded.bytes.len()),
                Err(e) => {
                    tracing::debug!(strategy = %strategy, error = %e, "Lower quality retry failed");
                }
            }
        }

        degrade(request, DegradeReason::NoSavings { best_output_size })
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self::new(ChainSettings::default())
    }
}

/// Run one attempt, turning a codec panic into an error.
fn run_attempt(
    codec: &dyn ImageCodec,
    input: &[u8],
    options: &TranscodeOptions,
) -> CodecResult<Encoded> {
    panic::catch_unwind(AssertUnwindSafe(|| codec.transcode(input, options)))
        .unwrap_or_else(|payload| Err(CodecError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn transformed(
    request: &CompressionRequest,
    strategy: Strategy,
    quality: u8,
    encoded: Encoded,
) -> CompressionResult {
    let output_size = encoded.bytes.len();
    CompressionResult {
        error: None,
        headers: PayloadHeaders {
            content_type: encoded.format.mime_type().to_string(),
            content_length: output_size,
            original_size: request.original_size,
            bytes_saved: request.original_size as i64 - output_size as i64,
        },
        output: encoded.bytes.into(),
        outcome: Outcome::Transformed { strategy, quality },
    }
}

fn degrade(request: &CompressionRequest, reason: DegradeReason) -> CompressionResult {
    CompressionResult {
        error: None,
        headers: PayloadHeaders {
            content_type: sniff_content_type(&request.source).to_string(),
            content_length: request.source.len(),
            original_size: request.original_size,
            bytes_saved: 0,
        },
        output: request.source.clone(),
        outcome: Outcome::Degraded(reason),
    }
}

/// Best-guess MIME type from magic bytes.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::X_BYTES_SAVED;
    use bytes::Bytes;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Deterministic "photo": smooth gradients plus a little noise.
    fn photo(width: u32, height: u32) -> RgbImage {
        let mut seed: u32 = 0x1234_5678;
        RgbImage::from_fn(width, height, |x, y| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (seed >> 28) as u8;
            Rgb([
                ((x * 255 / width) as u8).saturating_add(noise),
                ((y * 255 / height) as u8).saturating_add(noise),
                (((x + y) * 127 / (width + height)) as u8).saturating_add(noise),
            ])
        })
    }

    fn encode(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn max_quality_jpeg(img: &RgbImage) -> Vec<u8> {
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 100)
            .encode_image(img)
            .unwrap();
        out
    }

    fn request(source: Vec<u8>, webp: bool, grayscale: bool, quality: u8) -> CompressionRequest {
        let size = source.len();
        CompressionRequest::new(Bytes::from(source), webp, grayscale, quality, size)
    }

    /// Scripted codec recording every attempt.
    struct ScriptedCodec {
        calls: Mutex<Vec<TranscodeOptions>>,
        respond: Box<dyn Fn(&TranscodeOptions) -> CodecResult<Encoded> + Send + Sync>,
    }

    impl ScriptedCodec {
        fn new(respond: impl Fn(&TranscodeOptions) -> CodecResult<Encoded> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn calls(&self) -> Vec<TranscodeOptions> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ImageCodec for ScriptedCodec {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn transcode(&self, _input: &[u8], options: &TranscodeOptions) -> CodecResult<Encoded> {
            self.calls.lock().unwrap().push(options.clone());
            (self.respond)(options)
        }
    }

    fn bytes_of(len: usize, format: OutputFormat) -> Encoded {
        Encoded {
            bytes: vec![0u8; len],
            format,
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn test_png_is_transformed_with_exact_accounting() {
        let source = encode(&photo(128, 96), ImageFormat::Png);
        let req = request(source.clone(), false, true, 40);

        let result = FallbackChain::default().compress(&req);

        assert!(result.error.is_none());
        assert!(matches!(
            result.outcome,
            Outcome::Transformed { strategy: Strategy::Primary, quality: 40 }
        ));
        assert_eq!(result.headers.content_type, "image/jpeg");
        assert_eq!(result.headers.content_length, result.output.len());
        assert_eq!(
            result.bytes_saved(),
            source.len() as i64 - result.output.len() as i64
        );
        assert_eq!(
            result.headers.to_header_map()[X_BYTES_SAVED],
            (source.len() - result.output.len()).to_string().as_str()
        );
    }

    #[test]
    fn test_jpeg_quality_80_scenario() {
        let source = max_quality_jpeg(&photo(256, 256));
        let req = request(source.clone(), false, false, 80);

        let result = FallbackChain::default().compress(&req);

        assert!(result.is_transformed());
        assert_eq!(result.headers.content_type, "image/jpeg");
        assert!(result.bytes_saved() > 0);
        assert_eq!(result.bytes_saved(), source.len() as i64 - result.output.len() as i64);
    }

    fn webp_settings() -> ChainSettings {
        ChainSettings {
            webp_enabled: true,
            ..ChainSettings::default()
        }
    }

    #[test]
    fn test_webp_requested() {
        let source = encode(&photo(64, 64), ImageFormat::Png);
        let result = FallbackChain::new(webp_settings()).compress(&request(source, true, false, 50));
        assert_eq!(result.headers.content_type, "image/webp");
        assert_eq!(image::guess_format(&result.output).unwrap(), ImageFormat::WebP);
    }

    #[test]
    fn test_default_settings_emit_jpeg_for_webp_request() {
        let source = encode(&photo(64, 64), ImageFormat::Png);
        let result = FallbackChain::default().compress(&request(source, true, false, 50));
        assert_eq!(result.headers.content_type, "image/jpeg");
        assert_eq!(image::guess_format(&result.output).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_never_fails_on_empty_or_garbage() {
        let chain = FallbackChain::default();
        let mut seed: u32 = 7;
        let noise: Vec<u8> = (0..4096)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (seed >> 16) as u8
            })
            .collect();

        for input in [Vec::new(), b"<html>nope</html>".to_vec(), noise] {
            let req = request(input.clone(), true, true, 40);
            let result = chain.compress(&req);
            assert!(result.error.is_none());
            assert_eq!(result.output.as_ref(), input.as_slice());
            assert_eq!(result.bytes_saved(), 0);
            assert!(matches!(result.outcome, Outcome::Degraded(DegradeReason::Exhausted(_))));
        }
    }

    #[test]
    fn test_truncated_jpeg_degrades_to_original() {
        let jpeg = max_quality_jpeg(&photo(64, 64));
        let truncated = jpeg[..20].to_vec();
        let req = request(truncated.clone(), false, true, 40);

        let result = FallbackChain::default().compress(&req);

        assert!(result.error.is_none());
        assert_eq!(result.output.as_ref(), truncated.as_slice());
        assert_eq!(result.headers.bytes_saved, 0);
        assert_eq!(result.headers.content_type, "image/jpeg");
        assert_eq!(result.headers.content_length, 20);
    }

    #[test]
    fn test_half_truncated_jpeg_is_not_transcoded() {
        let jpeg = max_quality_jpeg(&photo(128, 128));
        let truncated = jpeg[..jpeg.len() / 2].to_vec();
        let req = request(truncated.clone(), false, true, 40);

        let result = FallbackChain::default().compress(&req);

        assert!(matches!(
            result.outcome,
            Outcome::Degraded(DegradeReason::Exhausted(CodecError::Decode(_)))
        ));
        assert_eq!(result.output.as_ref(), truncated.as_slice());
        assert_eq!(result.headers.bytes_saved, 0);
        assert_eq!(result.headers.content_type, "image/jpeg");
    }

    #[test]
    fn test_ladder_order_without_webp() {
        let primary = ScriptedCodec::new(|_| Err(CodecError::Decode("bad".into())));
        let alternate = ScriptedCodec::new(|_| Err(CodecError::Unsupported("png".into())));
        let chain = FallbackChain::with_codecs(
            primary.clone(),
            Some(alternate.clone() as Arc<dyn ImageCodec>),
            ChainSettings::default(),
        );

        let result = chain.compress(&request(vec![1; 10], false, false, 40));

        let calls = primary.calls();
        assert_eq!(calls.len(), 3, "format downgrade must not run for JPEG output");
        assert_eq!(calls[0].decode_mode, DecodeMode::Buffered);
        assert_eq!(calls[0].max_dimension, None);
        assert_eq!(calls[1].decode_mode, DecodeMode::Sequential);
        assert_eq!(calls[2].max_dimension, Some(4096));
        assert_eq!(alternate.calls().len(), 1);
        match result.outcome {
            Outcome::Degraded(DegradeReason::Exhausted(CodecError::Unsupported(_))) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_webp_encode_failure_downgrades_to_jpeg() {
        let primary = ScriptedCodec::new(|opts| match opts.format {
            OutputFormat::WebP => Err(CodecError::Encode {
                format: OutputFormat::WebP,
                reason: "too wide".into(),
            }),
            OutputFormat::Jpeg => Ok(bytes_of(5, OutputFormat::Jpeg)),
        });
        let chain = FallbackChain::with_codecs(primary.clone(), None, webp_settings());

        let result = chain.compress(&request(vec![9; 100], true, false, 40));

        assert!(matches!(
            result.outcome,
            Outcome::Transformed { strategy: Strategy::FormatDowngrade, .. }
        ));
        assert_eq!(result.headers.content_type, "image/jpeg");
        assert_eq!(result.bytes_saved(), 95);
        assert_eq!(primary.calls().len(), 4);
    }

    #[test]
    fn test_decode_failure_skips_format_downgrade() {
        let primary = ScriptedCodec::new(|_| Err(CodecError::Decode("eof".into())));
        let chain = FallbackChain::with_codecs(primary.clone(), None, webp_settings());

        chain.compress(&request(vec![9; 100], true, false, 40));

        assert_eq!(primary.calls().len(), 3);
    }

    #[test]
    fn test_alternate_codec_rescues_jpeg() {
        let primary = ScriptedCodec::new(|_| Err(CodecError::Decode("bad huffman".into())));
        let chain = FallbackChain::with_codecs(
            primary,
            Some(Arc::new(AlternateCodec::new()) as Arc<dyn ImageCodec>),
            ChainSettings::default(),
        );
        let source = max_quality_jpeg(&photo(64, 64));

        let result = chain.compress(&request(source, true, true, 40));

        assert!(matches!(
            result.outcome,
            Outcome::Transformed { strategy: Strategy::AlternateCodec, .. }
        ));
        assert_eq!(result.headers.content_type, "image/jpeg");
    }

    #[test]
    fn test_panicking_codec_is_contained() {
        let primary = ScriptedCodec::new(|_| panic!("decoder blew up"));
        let chain = FallbackChain::with_codecs(primary, None, ChainSettings::default());

        let result = chain.compress(&request(vec![1, 2, 3], false, false, 40));

        match result.outcome {
            Outcome::Degraded(DegradeReason::Exhausted(CodecError::Panicked(msg))) => {
                assert_eq!(msg, "decoder blew up");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(result.output.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn test_larger_output_retries_at_lower_quality() {
        // Output size tracks quality: 80 -> 800 bytes, 70 -> 700 bytes.
        let primary = ScriptedCodec::new(|opts| Ok(bytes_of(opts.quality as usize * 10, opts.format)));
        let chain = FallbackChain::with_codecs(primary.clone(), None, ChainSettings::default());

        let result = chain.compress(&request(vec![0; 750], false, false, 80));

        assert!(matches!(
            result.outcome,
            Outcome::Transformed { strategy: Strategy::Primary, quality: 70 }
        ));
        assert_eq!(result.bytes_saved(), 50);
        let qualities: Vec<u8> = primary.calls().iter().map(|o| o.quality).collect();
        assert_eq!(qualities, vec![80, 70]);
    }

    #[test]
    fn test_never_returns_larger_output() {
        let primary = ScriptedCodec::new(|opts| Ok(bytes_of(1000, opts.format)));
        let chain = FallbackChain::with_codecs(primary.clone(), None, ChainSettings::default());
        let source = vec![7u8; 500];

        let result = chain.compress(&request(source.clone(), false, false, 40));

        assert_eq!(result.output.as_ref(), source.as_slice());
        assert_eq!(result.bytes_saved(), 0);
        assert!(matches!(
            result.outcome,
            Outcome::Degraded(DegradeReason::NoSavings { best_output_size: 1000 })
        ));
        assert_eq!(primary.calls().len(), 2);
    }

    #[test]
    fn test_quality_one_is_not_retried() {
        let primary = ScriptedCodec::new(|opts| Ok(bytes_of(1000, opts.format)));
        let chain = FallbackChain::with_codecs(primary.clone(), None, ChainSettings::default());

        chain.compress(&request(vec![7u8; 500], false, false, 1));

        assert_eq!(primary.calls().len(), 1);
    }

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(sniff_content_type(&encode(&photo(4, 4), ImageFormat::Png)), "image/png");
        assert_eq!(sniff_content_type(b"hello"), "application/octet-stream");
        assert_eq!(sniff_content_type(&[]), "application/octet-stream");
    }
}
