//! Apply a redaction plan to a PDF.
//!
//! Two modes:
//! - `overlay` rewrites the text under each box to spaces and paints black
//!   rectangles over it. Vector content and images outside text stay as is.
//! - `rasterize` renders every page with pdfium, blacks out the boxes in the
//!   bitmap and rebuilds the document from JPEG page images, so nothing
//!   under a box survives.

use docshield_core::config::DEFAULT_RENDER_DPI;
use docshield_core::{BBox, PlannedBox, RedactionPlan};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgba};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use lopdf::content::{Content, Operation};
use lopdf::Object;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::str::FromStr;

use crate::content::{ContentWalker, StringSlot};
use crate::pdfium::{bind_pdfium, pdfium_err};
use crate::render::pixel_bounds;
use crate::utils::{get_page_box, get_page_content, set_page_content};
use crate::{is_pdf, PdfError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    #[default]
    Overlay,
    Rasterize,
}

impl FromStr for RedactionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overlay" => Ok(Self::Overlay),
            "rasterize" => Ok(Self::Rasterize),
            other => Err(format!("unknown redaction mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RedactOptions {
    /// Render resolution for `rasterize`.
    pub dpi: u32,
    pub jpeg_quality: u8,
}

impl Default for RedactOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_RENDER_DPI,
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedactionOutcome {
    pub bytes: Vec<u8>,
    pub mode: RedactionMode,
    /// Boxes that landed on an existing page, clipped to it.
    pub applied: Vec<PlannedBox>,
}

/// Apply every box of the plan and return the new document.
pub fn apply_plan(
    bytes: &[u8],
    plan: &RedactionPlan,
    mode: RedactionMode,
    options: &RedactOptions,
) -> Result<RedactionOutcome> {
    if !is_pdf(bytes) {
        return Err(PdfError::NotPdf);
    }
    log::info!(
        "[Redact] applying {} boxes on {} pages ({:?})",
        plan.total(),
        plan.pages.len(),
        mode
    );

    let (bytes, applied) = match mode {
        RedactionMode::Overlay => overlay(bytes, plan)?,
        RedactionMode::Rasterize => rasterize(bytes, plan, options)?,
    };
    Ok(RedactionOutcome {
        bytes,
        mode,
        applied,
    })
}

/// Clip each box to the page, dropping those left empty.
fn clip_boxes(boxes: &[PlannedBox], width: f64, height: f64) -> Vec<PlannedBox> {
    boxes
        .iter()
        .filter_map(|b| {
            b.bbox.clip_to(width, height).map(|bbox| PlannedBox {
                bbox,
                ..b.clone()
            })
        })
        .collect()
}

// ============================================================================
// Overlay
// ============================================================================

fn overlay(bytes: &[u8], plan: &RedactionPlan) -> Result<(Vec<u8>, Vec<PlannedBox>)> {
    let mut doc = lopdf::Document::load_mem(bytes)?;
    let pages = doc.get_pages();
    let mut applied = Vec::new();

    for (number, boxes) in &plan.pages {
        let Some(&page_id) = pages.get(number) else {
            log::warn!("[Redact] page {} not in document, skipped", number);
            continue;
        };
        let page_box = get_page_box(&doc, page_id);
        let clipped = clip_boxes(boxes, page_box.width(), page_box.height());
        if clipped.is_empty() {
            continue;
        }

        let masks: Vec<[f64; 4]> = clipped
            .iter()
            .map(|b| {
                let (x, y, w, h) =
                    page_box.to_user_rect(b.bbox.x0, b.bbox.y0, b.bbox.x1, b.bbox.y1);
                [x, y, x + w, y + h]
            })
            .collect();

        let data = get_page_content(&doc, page_id)?;
        let (scrubbed, replaced) = scrub_text(&data, &masks)?;
        let painted = add_black_overlay(scrubbed, &masks)?;
        set_page_content(&mut doc, page_id, painted)?;

        log::info!(
            "[Redact] page {}: {} boxes, {} characters removed",
            number,
            masks.len(),
            replaced
        );
        applied.extend(clipped);
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok((out, applied))
}

/// Replace shown bytes whose glyph box touches a mask with spaces.
/// Returns the rewritten operations and the number of bytes replaced.
pub fn scrub_text(content_data: &[u8], masks: &[[f64; 4]]) -> Result<(Vec<Operation>, usize)> {
    let content = Content::decode(content_data)?;
    let mut walker = ContentWalker::new();
    let mut operations = Vec::with_capacity(content.operations.len());
    let mut replaced = 0;

    for mut op in content.operations {
        for shown in walker.visit(&op) {
            let hits: Vec<usize> = shown
                .glyphs
                .iter()
                .enumerate()
                .filter(|(_, g)| masks.iter().any(|m| g.intersects(m)))
                .map(|(i, _)| i)
                .collect();
            if hits.is_empty() {
                continue;
            }
            if let Some(bytes) = string_at_mut(&mut op, shown.slot) {
                for i in hits {
                    if let Some(b) = bytes.get_mut(i) {
                        if *b != b' ' {
                            *b = b' ';
                            replaced += 1;
                        }
                    }
                }
            }
        }
        operations.push(op);
    }

    Ok((operations, replaced))
}

fn string_at_mut(op: &mut Operation, slot: StringSlot) -> Option<&mut Vec<u8>> {
    let obj = match slot {
        StringSlot::Operand(i) => op.operands.get_mut(i)?,
        StringSlot::ArrayItem(i) => match op.operands.first_mut()? {
            Object::Array(items) => items.get_mut(i)?,
            _ => return None,
        },
    };
    match obj {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

/// Wrap the page's operations in `q`/`Q` and paint the masks black on top.
pub fn add_black_overlay(operations: Vec<Operation>, masks: &[[f64; 4]]) -> Result<Vec<u8>> {
    let black = || vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)];

    let mut ops = Vec::with_capacity(operations.len() + masks.len() * 2 + 6);
    ops.push(Operation::new("q", vec![]));
    ops.extend(operations);
    ops.push(Operation::new("Q", vec![]));

    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("rg", black()));
    ops.push(Operation::new("RG", black()));
    for m in masks {
        log::debug!("[Redact] black box at {:?}", m);
        ops.push(Operation::new(
            "re",
            vec![
                Object::Real(m[0] as f32),
                Object::Real(m[1] as f32),
                Object::Real((m[2] - m[0]) as f32),
                Object::Real((m[3] - m[1]) as f32),
            ],
        ));
        ops.push(Operation::new("f", vec![]));
    }
    ops.push(Operation::new("Q", vec![]));

    Ok(Content { operations: ops }.encode()?)
}

// ============================================================================
// Rasterize
// ============================================================================

/// Pixel rectangle for a page box on a bitmap of `img_w x img_h`.
fn pixel_rect(bbox: &BBox, scale_x: f64, scale_y: f64, img_w: u32, img_h: u32) -> Option<Rect> {
    let (x, y, w, h) = pixel_bounds(bbox, scale_x, scale_y, img_w, img_h)?;
    Some(Rect::at(x as i32, y as i32).of_size(w, h))
}

fn rasterize(
    bytes: &[u8],
    plan: &RedactionPlan,
    options: &RedactOptions,
) -> Result<(Vec<u8>, Vec<PlannedBox>)> {
    let pdfium = bind_pdfium()?;
    let source = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| pdfium_err("load failed", e))?;
    let mut target = pdfium
        .create_new_pdf()
        .map_err(|e| pdfium_err("create failed", e))?;
    let scratch = tempfile::tempdir()?;

    let scale = options.dpi as f32 / 72.0;
    let black = Rgba([0u8, 0u8, 0u8, 255u8]);
    let page_count = source.pages().len();
    let mut applied = Vec::new();

    for page_idx in 0..page_count {
        let number = page_idx as u32 + 1;
        let page = source
            .pages()
            .get(page_idx)
            .map_err(|e| pdfium_err(&format!("page {}", number), e))?;
        let page_width = page.width();
        let page_height = page.height();

        let render_config = PdfRenderConfig::new()
            .set_target_width((page_width.value * scale) as i32)
            .set_target_height((page_height.value * scale) as i32);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| pdfium_err("render failed", e))?;
        let mut image = bitmap.as_image().to_rgba8();
        let (img_w, img_h) = image.dimensions();

        let clipped = clip_boxes(
            plan.boxes_for(number),
            page_width.value as f64,
            page_height.value as f64,
        );
        let scale_x = img_w as f64 / page_width.value as f64;
        let scale_y = img_h as f64 / page_height.value as f64;
        for b in &clipped {
            if let Some(rect) = pixel_rect(&b.bbox, scale_x, scale_y, img_w, img_h) {
                draw_filled_rect_mut(&mut image, rect, black);
            }
        }
        log::info!(
            "[Redact] page {} rasterized at {}x{} px, {} boxes",
            number,
            img_w,
            img_h,
            clipped.len()
        );
        applied.extend(clipped);

        let jpeg_path = scratch.path().join(format!("page_{}.jpg", number));
        {
            let file = std::fs::File::create(&jpeg_path)?;
            let mut writer = BufWriter::new(file);
            let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
            JpegEncoder::new_with_quality(&mut writer, options.jpeg_quality).encode_image(&rgb)?;
            writer.flush()?;
        }

        let mut new_page = target
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(page_width, page_height))
            .map_err(|e| pdfium_err("create page failed", e))?;
        let mut image_obj = PdfPageImageObject::new_from_jpeg_file(&target, &jpeg_path)
            .map_err(|e| pdfium_err("image object failed", e))?;
        image_obj
            .scale(page_width.value, page_height.value)
            .map_err(|e| pdfium_err("scale failed", e))?;
        new_page
            .objects_mut()
            .add_image_object(image_obj)
            .map_err(|e| pdfium_err("add image failed", e))?;
    }

    let out = target
        .save_to_bytes()
        .map_err(|e| pdfium_err("save failed", e))?;
    Ok((out, applied))
}
