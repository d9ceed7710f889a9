//! Image preparation: downscale and enhance a rendered page for transcription.
//!
//! Scans of aged paper are low-contrast and slightly soft. Two fixed boosts,
//! both configurable, make faded ink easier for the model to read:
//!
//! * **contrast** pulls every channel away from the page's mean luminance;
//! * **sharpness** pushes every pixel away from a 3×3 smoothed copy.
//!
//! A factor of `1.0` leaves the page untouched; `0.0` yields the degenerate
//! image (flat grey, or fully smoothed). The page stays in full colour
//! throughout: ink colour and stamp colour carry meaning.

use crate::config::ImageSettings;
use crate::pipeline::encode::{encode_page, PreparedImage};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use tracing::debug;

/// Smoothing kernel whose difference from the original defines "sharpness".
const SMOOTH_KERNEL: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];

/// Resize, enhance and encode one page.
pub fn prepare_image(image: DynamicImage, settings: &ImageSettings) -> Result<PreparedImage, image::ImageError> {
    let resized = resize_if_needed(image, settings.max_width);
    let mut rgb = resized.into_rgb8();
    adjust_contrast(&mut rgb, settings.contrast_factor);
    let enhanced = adjust_sharpness(rgb, settings.sharpness_factor);
    encode_page(&enhanced, settings.encoding)
}

/// Downscale so the width is at most `max_width`, preserving aspect ratio.
pub fn resize_if_needed(image: DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if width <= max_width {
        return image;
    }

    let new_height = ((u64::from(height) * u64::from(max_width)) / u64::from(width)).max(1) as u32;
    debug!("Downscaling page {}x{} → {}x{}", width, height, max_width, new_height);
    image.resize_exact(max_width, new_height, FilterType::Lanczos3)
}

/// Scale each channel's distance from the mean luminance by `factor`.
pub fn adjust_contrast(img: &mut RgbImage, factor: f32) {
    if is_identity(factor) || img.width() == 0 || img.height() == 0 {
        return;
    }

    let mean = mean_luma(img);
    for pixel in img.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = blend(mean, *channel, factor);
        }
    }
}

/// Scale each interior pixel's distance from its smoothed value by `factor`.
///
/// Border pixels have no full neighbourhood and are left as they are.
pub fn adjust_sharpness(img: RgbImage, factor: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    if is_identity(factor) || width < 3 || height < 3 {
        return img;
    }

    let smooth = imageops::filter3x3(&img, &SMOOTH_KERNEL);
    let mut out = img;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let base = smooth.get_pixel(x, y).0;
            let pixel = out.get_pixel_mut(x, y);
            for (channel, base) in pixel.0.iter_mut().zip(base) {
                *channel = blend(f32::from(base), *channel, factor);
            }
        }
    }
    out
}

/// Rounded mean of ITU-R 601-2 luma over the whole image.
fn mean_luma(img: &RgbImage) -> f32 {
    let total: u64 = img
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            (u64::from(r) * 299 + u64::from(g) * 587 + u64::from(b) * 114) / 1000
        })
        .sum();
    let count = u64::from(img.width()) * u64::from(img.height());
    (total as f64 / count as f64).round() as f32
}

fn blend(base: f32, value: u8, factor: f32) -> u8 {
    (base + factor * (f32::from(value) - base)).round().clamp(0.0, 255.0) as u8
}

fn is_identity(factor: f32) -> bool {
    (factor - 1.0).abs() < f32::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageEncoding;
    use image::{GrayImage, Luma, Rgb};

    fn settings(max_width: u32) -> ImageSettings {
        ImageSettings {
            max_width,
            contrast_factor: 1.3,
            sharpness_factor: 1.2,
            encoding: ImageEncoding::Png,
        }
    }

    #[test]
    fn wide_pages_are_downscaled_proportionally() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3200, 4000, Rgb([200, 190, 170])));
        let resized = resize_if_needed(img, 1600);
        assert_eq!((resized.width(), resized.height()), (1600, 2000));
    }

    #[test]
    fn narrow_pages_pass_through() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(800, 1000, Rgb([1, 2, 3])));
        let resized = resize_if_needed(img, 1600);
        assert_eq!((resized.width(), resized.height()), (800, 1000));
    }

    #[test]
    fn contrast_spreads_values_around_the_mean() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([100, 100, 100]));
        img.put_pixel(1, 0, Rgb([200, 200, 200]));

        adjust_contrast(&mut img, 2.0);
        assert_eq!(img.get_pixel(0, 0).0, [50, 50, 50]);
        assert_eq!(img.get_pixel(1, 0).0, [250, 250, 250]);
    }

    #[test]
    fn contrast_clamps_to_channel_range() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([0, 0, 0]));
        img.put_pixel(1, 0, Rgb([255, 255, 255]));
        adjust_contrast(&mut img, 3.0);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn unit_factors_leave_pixels_untouched() {
        let mut img = RgbImage::from_fn(5, 5, |x, y| Rgb([(x * 40) as u8, (y * 40) as u8, 90]));
        let original = img.clone();
        adjust_contrast(&mut img, 1.0);
        let img = adjust_sharpness(img, 1.0);
        assert_eq!(img, original);
    }

    #[test]
    fn sharpness_accentuates_an_isolated_stroke() {
        let mut img = RgbImage::from_pixel(5, 5, Rgb([200, 200, 200]));
        img.put_pixel(2, 2, Rgb([100, 100, 100]));

        let sharpened = adjust_sharpness(img, 2.0);
        assert!(sharpened.get_pixel(2, 2).0[0] < 100, "stroke should get darker");
        assert!(sharpened.get_pixel(1, 2).0[0] > 200, "neighbour should get lighter");
        assert_eq!(sharpened.get_pixel(0, 0).0, [200, 200, 200], "border untouched");
    }

    #[test]
    fn tiny_images_skip_sharpening() {
        let img = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        assert_eq!(adjust_sharpness(img.clone(), 3.0), img);
    }

    #[test]
    fn grayscale_scans_come_out_in_colour() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 20, Luma([180])));
        let prepared = prepare_image(gray, &settings(1600)).unwrap();
        assert_eq!(prepared.media_type, "image/png");

        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&prepared.data)
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(matches!(decoded, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn prepare_reports_final_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 50, Rgb([240, 230, 210])));
        let prepared = prepare_image(img, &settings(40)).unwrap();
        assert_eq!((prepared.width, prepared.height), (40, 20));
    }
}
