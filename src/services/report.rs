//! PDF report export for completed analyses
//!
//! Renders a two-page A4 document from a cached session: verdict and the
//! analyzed image on the first page, the Grad-CAM overlay with an
//! interpretation guide on the second.

use crate::error::{DetectionError, Result};
use crate::session::{SessionCache, SessionEntry};
use chrono::Utc;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfLayerReference,
};
use tracing::info;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const IMAGE_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;

/// Generate a PDF report for a cached session
///
/// # Errors
///
/// - `SessionNotFound` for unknown or expired session ids
/// - `Storage` when a persisted artifact can no longer be read
/// - `Internal` on PDF assembly failure
pub fn generate_report(sessions: &SessionCache, session_id: &str) -> Result<Vec<u8>> {
    let entry = sessions.get(session_id)?;

    let (doc, page, layer) = PdfDocument::new(
        "Image Authenticity Report",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "content",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| DetectionError::internal(format!("could not load report font: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| DetectionError::internal(format!("could not load report font: {e}")))?;

    render_summary_page(&doc.get_page(page).get_layer(layer), &font, &bold, &entry)?;

    let (page2, layer2) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
    render_overlay_page(&doc.get_page(page2).get_layer(layer2), &font, &bold, &entry)?;

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| DetectionError::internal(format!("could not serialize report: {e}")))?;
    info!(session = %session_id, bytes = bytes.len(), "report generated");
    Ok(bytes)
}

fn render_summary_page(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    bold: &IndirectFontRef,
    entry: &SessionEntry,
) -> Result<()> {
    let mut cursor = PAGE_HEIGHT_MM - MARGIN_MM;
    layer.use_text("Image Authenticity Report", 20.0, Mm(MARGIN_MM), Mm(cursor), bold);
    cursor -= 8.0;
    layer.use_text(
        format!("Generated {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")),
        10.0,
        Mm(MARGIN_MM),
        Mm(cursor),
        font,
    );
    cursor -= 6.0;
    layer.use_text(
        format!("Analyzed {}", entry.created.format("%Y-%m-%d %H:%M:%S UTC")),
        10.0,
        Mm(MARGIN_MM),
        Mm(cursor),
        font,
    );

    cursor -= 14.0;
    layer.use_text(
        format!("Verdict: {}", entry.response.prediction.label),
        14.0,
        Mm(MARGIN_MM),
        Mm(cursor),
        bold,
    );

    cursor -= 10.0;
    layer.use_text("Analyzed image:", 11.0, Mm(MARGIN_MM), Mm(cursor), font);
    cursor -= 4.0;
    embed_artifact(layer, &entry.source_path, cursor)?;
    Ok(())
}

fn render_overlay_page(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    bold: &IndirectFontRef,
    entry: &SessionEntry,
) -> Result<()> {
    let mut cursor = PAGE_HEIGHT_MM - MARGIN_MM;
    layer.use_text("Explanation Heatmap", 16.0, Mm(MARGIN_MM), Mm(cursor), bold);

    cursor -= 8.0;
    for line in wrap_text(&entry.response.explanation.description, 90) {
        layer.use_text(line, 10.0, Mm(MARGIN_MM), Mm(cursor), font);
        cursor -= 5.0;
    }

    cursor -= 4.0;
    embed_artifact(layer, &entry.overlay_path, cursor)?;
    Ok(())
}

/// Embed a persisted PNG artifact below a vertical position
///
/// Scaled to the content width via the embed DPI, clamped to the available
/// page height.
fn embed_artifact(layer: &PdfLayerReference, path: &std::path::Path, top_mm: f32) -> Result<()> {
    let dynamic = printpdf::image_crate::open(path)
        .map_err(|e| DetectionError::storage(format!("could not read persisted artifact: {e}")))?;
    let (px_w, px_h) = (dynamic.width() as f32, dynamic.height() as f32);

    // dpi such that px_w renders at the content width.
    let mut dpi = px_w * 25.4 / IMAGE_WIDTH_MM;
    let available_mm = top_mm - MARGIN_MM;
    let height_mm = px_h * 25.4 / dpi;
    if height_mm > available_mm {
        dpi = px_h * 25.4 / available_mm;
    }
    let rendered_height_mm = px_h * 25.4 / dpi;

    let image = Image::from_dynamic_image(&dynamic);
    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(MARGIN_MM)),
            translate_y: Some(Mm(top_mm - rendered_height_mm)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
    Ok(())
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
