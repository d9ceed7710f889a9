//! Image encoding: enhanced `RgbImage` → base64 payload for the service.
//!
//! The Messages API accepts images as base64 blocks embedded in the JSON
//! request body, tagged with their media type. PNG is the default because it
//! is lossless: JPEG block artefacts blur exactly the faint, thin pen strokes
//! a transcription of aged handwriting depends on.

use crate::config::ImageEncoding;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use tracing::debug;

/// A page ready to be attached to a transcription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    /// Standard-alphabet base64 of the encoded image.
    pub data: String,
    /// `image/png` or `image/jpeg`.
    pub media_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Encode a prepared page and wrap it in base64.
pub fn encode_page(img: &RgbImage, encoding: ImageEncoding) -> Result<PreparedImage, image::ImageError> {
    let mut buf = Vec::new();
    match encoding {
        ImageEncoding::Png => {
            let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
            encoder.write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)?;
        }
        ImageEncoding::Jpeg { quality } => {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            encoder.encode_image(img)?;
        }
    }

    let data = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} page as {} → {} bytes base64",
        img.width(),
        img.height(),
        encoding,
        data.len()
    );

    Ok(PreparedImage {
        data,
        media_type: encoding.media_type(),
        width: img.width(),
        height: img.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn png_round_trips_losslessly() {
        let mut img = RgbImage::from_pixel(12, 7, Rgb([250, 240, 220]));
        img.put_pixel(3, 3, Rgb([20, 30, 120]));

        let prepared = encode_page(&img, ImageEncoding::Png).expect("encode should succeed");
        assert_eq!(prepared.media_type, "image/png");
        assert_eq!((prepared.width, prepared.height), (12, 7));

        let bytes = STANDARD.decode(&prepared.data).expect("valid base64");
        assert_eq!(&bytes[1..4], b"PNG");
        let decoded = image::load_from_memory(&bytes).unwrap().into_rgb8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn jpeg_is_available_as_a_choice() {
        let img = RgbImage::from_pixel(16, 16, Rgb([128, 64, 32]));
        let prepared = encode_page(&img, ImageEncoding::Jpeg { quality: 85 }).unwrap();
        assert_eq!(prepared.media_type, "image/jpeg");
        let bytes = STANDARD.decode(&prepared.data).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
