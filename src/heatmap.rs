//! Importance-map rendering: colorization and overlay compositing
//!
//! Turns a coarse [0, 1] importance map into a full-resolution jet-colored
//! heatmap and an alpha blend over the original image. The heatmap is
//! upscaled with bilinear filtering before colorization so color gradients
//! stay smooth across the overlay.

use crate::error::{DetectionError, Result};
use image::{imageops::FilterType, DynamicImage, ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::Array2;

/// Rendered explanation artifacts for one image
pub struct RenderedHeatmap {
    /// Jet-colored heatmap at the original image resolution
    pub heatmap: RgbImage,
    /// Heatmap alpha-blended over the original image
    pub overlay: RgbImage,
}

/// Map a [0, 1] intensity to a jet color ramp
///
/// Blue through cyan, green and yellow to red, matching the conventional
/// jet palette used for saliency visualizations.
#[must_use]
pub fn jet_color(intensity: f32) -> Rgb<u8> {
    let v = intensity.clamp(0.0, 1.0);
    let channel = |x: f32| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
    let r = channel(1.5 - (4.0 * v - 3.0).abs());
    let g = channel(1.5 - (4.0 * v - 2.0).abs());
    let b = channel(1.5 - (4.0 * v - 1.0).abs());
    Rgb([r, g, b])
}

/// Upscale an importance map to the target resolution
///
/// Bilinear interpolation over the raw f32 values, before any
/// quantization, so coarse 7x7 maps come out as smooth gradients.
fn resize_map(map: &Array2<f32>, width: u32, height: u32) -> Result<ImageBuffer<Luma<f32>, Vec<f32>>> {
    let (map_h, map_w) = map.dim();
    let source: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(
        map_w as u32,
        map_h as u32,
        map.iter().copied().collect(),
    )
    .ok_or_else(|| DetectionError::explanation("importance map buffer size mismatch"))?;
    Ok(image::imageops::resize(&source, width, height, FilterType::Triangle))
}

/// Render an importance map over its source image
///
/// `alpha` weights the heatmap and `beta` the original in the blended
/// overlay. Both rendered images match the source image's dimensions.
///
/// # Errors
///
/// `DetectionError::Explanation` when the map cannot be rasterized.
pub fn composite(
    original: &DynamicImage,
    map: &Array2<f32>,
    alpha: f32,
    beta: f32,
) -> Result<RenderedHeatmap> {
    let (width, height) = (original.width(), original.height());
    let source = original.to_rgb8();
    let scaled = resize_map(map, width, height)?;

    let mut heatmap = RgbImage::new(width, height);
    let mut overlay = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let intensity = scaled.get_pixel(x, y)[0];
            let color = jet_color(intensity);
            heatmap.put_pixel(x, y, color);

            let base = source.get_pixel(x, y);
            let mut blended = [0u8; 3];
            for c in 0..3 {
                let value = alpha * f32::from(color[c]) + beta * f32::from(base[c]);
                blended[c] = value.round().clamp(0.0, 255.0) as u8;
            }
            overlay.put_pixel(x, y, Rgb(blended));
        }
    }

    Ok(RenderedHeatmap { heatmap, overlay })
}
