//! Upload validation and image-to-tensor preprocessing
//!
//! The transform is deterministic: RGB conversion, an aspect-distorting
//! square resize with bilinear filtering, [0,1] scaling and per-channel
//! affine normalization, emitted as an NCHW tensor with batch dimension 1.

use crate::{
    config::{
        DetectionConfig, MAX_IMAGE_DIMENSION, MIN_IMAGE_DIMENSION, NORMALIZATION_MEAN,
        NORMALIZATION_STD,
    },
    error::{DetectionError, Result},
};
use image::DynamicImage;
use ndarray::Array4;
use tracing::debug;

/// Validate a raw upload before any decoding is attempted
///
/// Rejects unsupported content types and oversized payloads. Runs first so
/// no numeric work is spent on requests that can never succeed.
///
/// # Errors
///
/// - `UnsupportedContentType` when the declared type is not accepted
/// - `InvalidInput` when the payload exceeds the configured ceiling or is empty
pub fn validate_upload(content_type: &str, payload_len: usize, config: &DetectionConfig) -> Result<()> {
    if !config.accepts_content_type(content_type) {
        return Err(DetectionError::unsupported_content_type(format!(
            "{} (allowed: {})",
            content_type,
            config.allowed_content_types.join(", ")
        )));
    }
    if payload_len == 0 {
        return Err(DetectionError::invalid_input("empty payload"));
    }
    if payload_len > config.max_payload_bytes {
        return Err(DetectionError::invalid_input(format!(
            "payload of {} bytes exceeds the {} byte limit",
            payload_len, config.max_payload_bytes
        )));
    }
    Ok(())
}

/// Decode image bytes, reporting corruption as an input error
///
/// # Errors
///
/// `InvalidInput` when the bytes cannot be decoded into pixel data.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| DetectionError::invalid_input(format!("could not decode image data: {}", e)))
}

/// Validate that both image axes are within the accepted range
///
/// # Errors
///
/// `InvalidInput` when either axis is outside [32, 4096].
pub fn validate_dimensions(image: &DynamicImage) -> Result<()> {
    let (width, height) = (image.width(), image.height());
    if width < MIN_IMAGE_DIMENSION || height < MIN_IMAGE_DIMENSION {
        return Err(DetectionError::invalid_input(format!(
            "image dimensions {}x{} below the {}px minimum",
            width, height, MIN_IMAGE_DIMENSION
        )));
    }
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(DetectionError::invalid_input(format!(
            "image dimensions {}x{} exceed the {}px maximum",
            width, height, MAX_IMAGE_DIMENSION
        )));
    }
    Ok(())
}

/// Preprocess an image into a normalized NCHW tensor
///
/// The resize distorts aspect ratio rather than cropping; callers needing
/// aspect preservation must pre-process. Deterministic given identical
/// input bytes.
pub fn preprocess(image: &DynamicImage, config: &DetectionConfig) -> Array4<f32> {
    let size = config.image_size;
    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, size, size, image::imageops::FilterType::Triangle);

    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (y, row) in resized.rows().enumerate() {
        for (x, pixel) in row.enumerate() {
            for c in 0..3 {
                let value = f32::from(pixel[c]) / 255.0;
                tensor[[0, c, y, x]] = (value - NORMALIZATION_MEAN[c]) / NORMALIZATION_STD[c];
            }
        }
    }

    debug!(
        width = image.width(),
        height = image.height(),
        target = size,
        "preprocessed image to tensor"
    );
    tensor
}
