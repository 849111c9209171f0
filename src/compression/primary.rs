//! Primary codec backed by the `image` crate for decoding, `jpeg-encoder`
//! for progressive JPEG output and libwebp (`webp` crate) for lossy WebP.

use std::io::{BufReader, Cursor};

use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader, Limits};
use jpeg_encoder::{ColorType, Encoder as JpegEncoder, SamplingFactor};

use crate::compression::codec::{
    check_jpeg_complete, check_pixel_limit, fit_within, CodecError, CodecResult, DecodeMode,
    Encoded, ImageCodec, OutputFormat, TranscodeOptions,
};

/// Largest side libwebp accepts.
pub const WEBP_MAX_DIMENSION: u32 = 16_383;

/// Largest side a baseline/progressive JFIF stream can describe.
pub const JPEG_MAX_DIMENSION: u32 = u16::MAX as u32;

/// Read buffer used by [`DecodeMode::Sequential`].
const SEQUENTIAL_READ_BUFFER: usize = 64 * 1024;

/// Bytes per pixel budgeted for the decoder's allocations (RGBA8).
const ALLOC_BYTES_PER_PIXEL: u64 = 4;

#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryCodec;

impl PrimaryCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for PrimaryCodec {
    fn name(&self) -> &'static str {
        "image"
    }

    fn transcode(&self, input: &[u8], options: &TranscodeOptions) -> CodecResult<Encoded> {
        check_jpeg_complete(input)?;

        let decoded = match options.decode_mode {
            DecodeMode::Buffered => decode_buffered(input, options.max_pixels)?,
            DecodeMode::Sequential => decode_sequential(input, options.max_pixels)?,
        };

        let mut image = match options.max_dimension {
            Some(max) => downscale(decoded, max),
            None => decoded,
        };

        if options.grayscale {
            image = image.grayscale();
        }

        let bytes = match options.format {
            OutputFormat::Jpeg => encode_jpeg(&image, options.quality)?,
            OutputFormat::WebP => encode_webp(&image, options.quality)?,
        };

        Ok(Encoded {
            bytes,
            format: options.format,
            width: image.width(),
            height: image.height(),
        })
    }
}

fn decoder_limits(max_pixels: u64) -> Limits {
    let mut limits = Limits::default();
    limits.max_alloc = Some(max_pixels.saturating_mul(ALLOC_BYTES_PER_PIXEL));
    limits
}

fn decode_error(e: image::ImageError) -> CodecError {
    match e {
        image::ImageError::Unsupported(e) => CodecError::Unsupported(e.to_string()),
        other => CodecError::Decode(other.to_string()),
    }
}

fn decode_buffered(input: &[u8], max_pixels: u64) -> CodecResult<DynamicImage> {
    let open = || {
        ImageReader::new(Cursor::new(input))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))
    };

    let mut reader = open()?;
    if reader.format().is_none() {
        return Err(CodecError::Unsupported("unrecognised image format".into()));
    }

    let (width, height) = open()?.into_dimensions().map_err(decode_error)?;
    check_pixel_limit(width, height, max_pixels)?;

    reader.limits(decoder_limits(max_pixels));
    reader.decode().map_err(decode_error)
}

fn decode_sequential(input: &[u8], max_pixels: u64) -> CodecResult<DynamicImage> {
    let format = image::guess_format(input).map_err(decode_error)?;
    let stream = BufReader::with_capacity(SEQUENTIAL_READ_BUFFER, Cursor::new(input));

    let mut decoder = ImageReader::with_format(stream, format)
        .into_decoder()
        .map_err(decode_error)?;
    let (width, height) = decoder.dimensions();
    check_pixel_limit(width, height, max_pixels)?;

    decoder
        .set_limits(decoder_limits(max_pixels))
        .map_err(decode_error)?;
    DynamicImage::from_decoder(decoder).map_err(decode_error)
}

fn downscale(image: DynamicImage, max: u32) -> DynamicImage {
    match fit_within(image.width(), image.height(), max) {
        Some((width, height)) => {
            tracing::debug!(
                from_width = image.width(),
                from_height = image.height(),
                to_width = width,
                to_height = height,
                "Safety downscale"
            );
            image.resize_exact(width, height, FilterType::Triangle)
        }
        None => image,
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> CodecResult<Vec<u8>> {
    let jpeg_error = |reason: String| CodecError::Encode {
        format: OutputFormat::Jpeg,
        reason,
    };

    let (width, height) = (image.width(), image.height());
    if width > JPEG_MAX_DIMENSION || height > JPEG_MAX_DIMENSION {
        return Err(jpeg_error(format!("{width}x{height} exceeds the JPEG size limit")));
    }

    let (pixels, color_type) = match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => (image.to_luma8().into_raw(), ColorType::Luma),
        _ => (image.to_rgb8().into_raw(), ColorType::Rgb),
    };

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new(&mut buf, quality);
    encoder.set_progressive(true);
    encoder.set_sampling_factor(SamplingFactor::R_4_4_4);
    encoder
        .encode(&pixels, width as u16, height as u16, color_type)
        .map_err(|e| jpeg_error(e.to_string()))?;

    Ok(buf)
}

fn encode_webp(image: &DynamicImage, quality: u8) -> CodecResult<Vec<u8>> {
    let webp_error = |reason: String| CodecError::Encode {
        format: OutputFormat::WebP,
        reason,
    };

    let (width, height) = (image.width(), image.height());
    if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
        return Err(webp_error(format!("{width}x{height} exceeds the WebP size limit")));
    }

    let memory = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height)
            .encode_simple(false, f32::from(quality))
            .map_err(|e| webp_error(format!("{e:?}")))?
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height)
            .encode_simple(false, f32::from(quality))
            .map_err(|e| webp_error(format!("{e:?}")))?
    };

    Ok(memory.to_vec())
}
