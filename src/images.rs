use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::config::{IMAGE_JPEG_QUALITY, IMAGE_MAX_HEIGHT, IMAGE_MAX_WIDTH, THUMBNAIL_SIZE};
use crate::core::errors::ApiError;

pub const ALLOWED_IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

pub fn is_allowed_image_type(content_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&content_type.to_ascii_lowercase().as_str())
}

/// Decode an upload once; both output sizes are derived from the result.
pub fn decode(data: &[u8]) -> Result<DynamicImage, ApiError> {
    image::load_from_memory(data)
        .map_err(|_| ApiError::BadRequest("Invalid file type. Only images allowed.".to_string()))
}

/// Optimize an uploaded image: downscale to fit 1200x1200 when larger,
/// re-encode as JPEG quality 85. Alpha is dropped in the RGB conversion,
/// matching what a JPEG can carry.
pub fn optimize(img: &DynamicImage) -> Result<Vec<u8>, ApiError> {
    if img.width() > IMAGE_MAX_WIDTH || img.height() > IMAGE_MAX_HEIGHT {
        let resized = img.resize(IMAGE_MAX_WIDTH, IMAGE_MAX_HEIGHT, FilterType::Lanczos3);
        encode_jpeg(&resized.to_rgb8())
    } else {
        encode_jpeg(&img.to_rgb8())
    }
}

/// Small square-bounded version for profile pictures and feed cards.
pub fn thumbnail(img: &DynamicImage) -> Result<Vec<u8>, ApiError> {
    if img.width() > THUMBNAIL_SIZE || img.height() > THUMBNAIL_SIZE {
        let resized = img.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);
        encode_jpeg(&resized.to_rgb8())
    } else {
        encode_jpeg(&img.to_rgb8())
    }
}

fn encode_jpeg(img: &image::RgbImage) -> Result<Vec<u8>, ApiError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, IMAGE_JPEG_QUALITY)
        .encode_image(img)
        .map_err(|e| ApiError::InternalError(format!("Image encoding failed: {}", e)))?;
    Ok(out)
}
