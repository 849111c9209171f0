//! Alternate codec: a second, independent JPEG pipeline.
//!
//! Decodes with `zune-jpeg` in non-strict mode (truncated or slightly
//! corrupt scans are filled rather than rejected) and encodes baseline JPEG
//! through `image`'s own encoder. Only JPEG input is accepted and only JPEG
//! is produced.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, RgbImage};
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

use crate::compression::codec::{
    check_jpeg_complete, check_pixel_limit, fit_within, CodecError, CodecResult, Encoded,
    ImageCodec, OutputFormat, TranscodeOptions,
};
use crate::compression::primary::JPEG_MAX_DIMENSION;

const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];

#[derive(Debug, Default, Clone, Copy)]
pub struct AlternateCodec;

impl AlternateCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for AlternateCodec {
    fn name(&self) -> &'static str {
        "zune-jpeg"
    }

    fn transcode(&self, input: &[u8], options: &TranscodeOptions) -> CodecResult<Encoded> {
        if !input.starts_with(&JPEG_SOI) {
            return Err(CodecError::Unsupported("alternate codec only reads JPEG".into()));
        }
        // Non-strict decoding would pad a cut-off scan with grey.
        check_jpeg_complete(input)?;

        let colorspace = if options.grayscale {
            ColorSpace::Luma
        } else {
            ColorSpace::RGB
        };
        let decoder_options = DecoderOptions::default()
            .set_strict_mode(false)
            .set_max_width(JPEG_MAX_DIMENSION as usize)
            .set_max_height(JPEG_MAX_DIMENSION as usize)
            .jpeg_set_out_colorspace(colorspace);

        let mut decoder = JpegDecoder::new_with_options(input, decoder_options);
        decoder
            .decode_headers()
            .map_err(|e| CodecError::Decode(format!("{e:?}")))?;
        let (width, height) = decoder
            .dimensions()
            .ok_or_else(|| CodecError::Decode("missing frame header".into()))?;
        let (width, height) = (width as u32, height as u32);
        check_pixel_limit(width, height, options.max_pixels)?;

        let pixels = decoder
            .decode()
            .map_err(|e| CodecError::Decode(format!("{e:?}")))?;

        let image = if options.grayscale {
            GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        } else {
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        .ok_or_else(|| CodecError::Decode("decoded buffer does not match frame size".into()))?;

        let image = match options.max_dimension.and_then(|max| fit_within(width, height, max)) {
            Some((w, h)) => image.thumbnail_exact(w, h),
            None => image,
        };

        let (color_type, raw) = match &image {
            DynamicImage::ImageLuma8(gray) => (ExtendedColorType::L8, gray.as_raw().as_slice()),
            DynamicImage::ImageRgb8(rgb) => (ExtendedColorType::Rgb8, rgb.as_raw().as_slice()),
            _ => return Err(CodecError::Decode("unexpected pixel layout".into())),
        };

        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, options.quality)
            .write_image(raw, image.width(), image.height(), color_type)
            .map_err(|e| CodecError::Encode {
                format: OutputFormat::Jpeg,
                reason: e.to_string(),
            })?;

        Ok(Encoded {
            bytes,
            format: OutputFormat::Jpeg,
            width: image.width(),
            height: image.height(),
        })
    }
}
