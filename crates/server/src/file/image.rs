//! Upload validation and resizing for catalog images.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Maximum accepted upload size (10 MB).
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Longest edge of a stored image.
pub const MAX_DIMENSION: u32 = 1200;

/// Image types accepted for upload, by sniffed MIME type.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Reasons an upload is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image too large: {size} bytes exceeds {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("file is not a recognized image")]
    NotAnImage,

    #[error("image type not allowed: {0}")]
    UnsupportedType(String),

    #[error("image could not be decoded")]
    Undecodable,

    #[error("image could not be encoded")]
    Unencodable,
}

/// A validated image ready for storage.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Validate, decode and bound an uploaded image to
/// [`MAX_DIMENSION`]×[`MAX_DIMENSION`], keeping its aspect ratio.
///
/// JPEG input stays JPEG; everything else is stored as PNG so transparency
/// survives.
pub fn process_image(data: &[u8]) -> Result<ProcessedImage, ImageError> {
    if data.len() > MAX_UPLOAD_SIZE {
        return Err(ImageError::TooLarge {
            size: data.len(),
            max: MAX_UPLOAD_SIZE,
        });
    }

    let kind = infer::get(data).ok_or(ImageError::NotAnImage)?;
    let mime = kind.mime_type();
    if !mime.starts_with("image/") {
        return Err(ImageError::NotAnImage);
    }
    if !ALLOWED_IMAGE_TYPES.contains(&mime) {
        return Err(ImageError::UnsupportedType(mime.to_string()));
    }

    let mut img = image::load_from_memory(data).map_err(|e| {
        tracing::debug!(error = %e, mime, "failed to decode upload");
        ImageError::Undecodable
    })?;

    if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
        img = img.resize(
            MAX_DIMENSION,
            MAX_DIMENSION,
            image::imageops::FilterType::Lanczos3,
        );
    }

    let (format, extension, img) = if mime == "image/jpeg" {
        (
            ImageFormat::Jpeg,
            "jpg",
            DynamicImage::ImageRgb8(img.to_rgb8()),
        )
    } else {
        (ImageFormat::Png, "png", img)
    };

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).map_err(|e| {
        tracing::warn!(error = %e, "failed to encode image");
        ImageError::Unencodable
    })?;

    Ok(ProcessedImage {
        bytes: buf.into_inner(),
        extension,
        width: img.width(),
        height: img.height(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn oversized_image_is_bounded_keeping_aspect_ratio() {
        let png = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(2400, 1200, Rgb([200, 150, 0]))),
            ImageFormat::Png,
        );
        let processed = process_image(&png).unwrap();
        assert_eq!((processed.width, processed.height), (1200, 600));
        assert_eq!(processed.extension, "png");
    }

    #[test]
    fn small_image_keeps_its_size() {
        let jpeg = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([10, 20, 30]))),
            ImageFormat::Jpeg,
        );
        let processed = process_image(&jpeg).unwrap();
        assert_eq!((processed.width, processed.height), (64, 32));
        assert_eq!(processed.extension, "jpg");
        assert_eq!(infer::get(&processed.bytes).unwrap().mime_type(), "image/jpeg");
    }

    #[test]
    fn transparent_png_stays_png() {
        let png = encode(
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]))),
            ImageFormat::Png,
        );
        let processed = process_image(&png).unwrap();
        assert_eq!(infer::get(&processed.bytes).unwrap().mime_type(), "image/png");
    }

    #[test]
    fn non_images_are_rejected() {
        assert_eq!(
            process_image(b"definitely not an image").unwrap_err(),
            ImageError::NotAnImage
        );
        assert_eq!(
            process_image(b"%PDF-1.7\n%binary").unwrap_err(),
            ImageError::NotAnImage
        );
    }

    #[test]
    fn uploads_over_the_limit_are_rejected() {
        let data = vec![0u8; MAX_UPLOAD_SIZE + 1];
        assert!(matches!(
            process_image(&data),
            Err(ImageError::TooLarge { .. })
        ));
    }
}
