//! Page and region rendering through pdfium.

use docshield_core::{BBox, Region};
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;

use crate::pdfium::{bind_pdfium, pdfium_err};
use crate::{is_pdf, PdfError, Result};

#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RenderedRegion {
    pub id: String,
    pub page: u32,
    pub bbox: BBox,
    pub png: Vec<u8>,
}

/// Pixel bounds `(x, y, w, h)` of a page box on a `img_w x img_h` bitmap.
/// `None` when nothing of the box lands on the bitmap.
pub(crate) fn pixel_bounds(
    bbox: &BBox,
    scale_x: f64,
    scale_y: f64,
    img_w: u32,
    img_h: u32,
) -> Option<(u32, u32, u32, u32)> {
    let x = ((bbox.x0 * scale_x).floor().max(0.0) as u32).min(img_w);
    let y = ((bbox.y0 * scale_y).floor().max(0.0) as u32).min(img_h);
    let x_end = ((bbox.x1 * scale_x).ceil().max(0.0) as u32).min(img_w);
    let y_end = ((bbox.y1 * scale_y).ceil().max(0.0) as u32).min(img_h);
    if x_end <= x || y_end <= y {
        return None;
    }
    Some((x, y, x_end - x, y_end - y))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    image.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

fn render_page(document: &PdfDocument, number: u32, dpi: u32) -> Result<(DynamicImage, f64, f64)> {
    let page = document
        .pages()
        .get((number - 1) as u16)
        .map_err(|e| pdfium_err(&format!("page {}", number), e))?;
    let page_width = page.width().value;
    let page_height = page.height().value;

    let scale = dpi as f32 / 72.0;
    let target_width = (page_width * scale) as i32;
    let target_height = (page_height * scale) as i32;
    log::debug!(
        "[Render] page {}: {}x{} pt -> {}x{} px (DPI: {})",
        number,
        page_width,
        page_height,
        target_width,
        target_height,
        dpi
    );

    let render_config = PdfRenderConfig::new()
        .set_target_width(target_width)
        .set_target_height(target_height);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| pdfium_err("render failed", e))?;

    Ok((bitmap.as_image(), page_width as f64, page_height as f64))
}

fn valid_page(number: u32, page_count: u32) -> bool {
    (1..=page_count).contains(&number)
}

/// Render the requested pages to PNG. Out-of-range pages are skipped.
pub fn render_pages(bytes: &[u8], pages: &[u32], dpi: u32) -> Result<Vec<RenderedImage>> {
    if !is_pdf(bytes) {
        return Err(PdfError::NotPdf);
    }
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| pdfium_err("load failed", e))?;
    let page_count = document.pages().len() as u32;

    let mut out = Vec::new();
    for &number in pages {
        if !valid_page(number, page_count) {
            log::debug!("[Render] page {} out of range, skipped", number);
            continue;
        }
        let (image, _, _) = render_page(&document, number, dpi)?;
        out.push(RenderedImage {
            page: number,
            width: image.width(),
            height: image.height(),
            png: encode_png(&image)?,
        });
    }
    log::info!("[Render] rendered {} of {} requested pages", out.len(), pages.len());
    Ok(out)
}

/// Render page crops for each region. Regions on missing pages, or that
/// fall off their page, are skipped.
pub fn render_regions(bytes: &[u8], regions: &[Region], dpi: u32) -> Result<Vec<RenderedRegion>> {
    if !is_pdf(bytes) {
        return Err(PdfError::NotPdf);
    }
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| pdfium_err("load failed", e))?;
    let page_count = document.pages().len() as u32;

    let mut rendered: HashMap<u32, (DynamicImage, f64, f64)> = HashMap::new();
    let mut out = Vec::new();

    for region in regions {
        if !valid_page(region.page, page_count) {
            continue;
        }
        if !rendered.contains_key(&region.page) {
            let page = render_page(&document, region.page, dpi)?;
            rendered.insert(region.page, page);
        }
        let Some((image, width, height)) = rendered.get(&region.page) else {
            continue;
        };
        let Some(bbox) = region.bbox.clip_to(*width, *height) else {
            continue;
        };
        let scale_x = image.width() as f64 / width;
        let scale_y = image.height() as f64 / height;
        let Some((x, y, w, h)) =
            pixel_bounds(&bbox, scale_x, scale_y, image.width(), image.height())
        else {
            continue;
        };

        out.push(RenderedRegion {
            id: region.id.clone(),
            page: region.page,
            bbox,
            png: encode_png(&image.crop_imm(x, y, w, h))?,
        });
    }
    log::info!("[Render] rendered {} of {} regions", out.len(), regions.len());
    Ok(out)
}
