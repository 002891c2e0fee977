//! PDF geometry, rendering and redaction.
//!
//! [`PdfDocument`] exposes a PDF through the core [`Document`] interface.
//! Characters come from pdfium when the library can be bound, otherwise from
//! walking the content streams with lopdf. Image placements always come from
//! the content streams.

pub mod content;
pub mod extract;
pub mod layout;
pub mod pdfium;
pub mod redact;
pub mod render;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use docshield_core::{BBox, BlockKind, ContentBlock, CoreError, Document, Page, Token};
use serde::{Deserialize, Serialize};

use crate::layout::Glyph;
use crate::utils::{get_page_box, get_page_rotation, PageBox};

pub use extract::{extract, Extraction};
pub use redact::{apply_plan, RedactOptions, RedactionMode, RedactionOutcome};
pub use render::{render_pages, render_regions, RenderedImage, RenderedRegion};

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("not a PDF document")]
    NotPdf,

    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),

    #[error("pdfium library unavailable: {0}")]
    PdfiumUnavailable(String),

    #[error("pdfium error: {0}")]
    Pdfium(String),

    #[error("page {0} not found")]
    PageNotFound(u32),

    #[error("content stream error: {0}")]
    Content(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PdfError> for CoreError {
    fn from(e: PdfError) -> Self {
        CoreError::Provider(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;

/// Whether the bytes carry a PDF header.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Source of the character geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extractor {
    Pdfium,
    ContentStream,
}

#[derive(Debug, Clone)]
struct PageGeometry {
    page: Page,
    glyphs: Vec<Glyph>,
    images: Vec<BBox>,
}

/// A parsed PDF with per-page character and image geometry.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    pages: Vec<PageGeometry>,
    extractor: Extractor,
    /// Plain text per page, when pdfium supplied it.
    pdfium_text: Option<Vec<String>>,
}

/// User-space `[x0, y0, x1, y1]` (y up) to a top-left page box.
pub(crate) fn user_rect_to_bbox(page_box: &PageBox, rect: &[f64; 4]) -> Option<BBox> {
    let (left, top) = page_box.to_page(rect[0], rect[3]);
    let (right, bottom) = page_box.to_page(rect[2], rect[1]);
    BBox::new(left, top, right, bottom)
}

fn content_glyphs(page_box: &PageBox, glyphs: &[Option<(char, [f64; 4])>]) -> Vec<Glyph> {
    glyphs
        .iter()
        .filter_map(|g| match g {
            None => Some(Glyph::Break),
            Some((ch, rect)) => {
                user_rect_to_bbox(page_box, rect).map(|bbox| Glyph::Char { ch: *ch, bbox })
            }
        })
        .collect()
}

impl PdfDocument {
    /// Open with pdfium glyphs when the library is bound, content streams otherwise.
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let preferred = if pdfium::is_available() {
            Extractor::Pdfium
        } else {
            Extractor::ContentStream
        };
        Self::open_with(bytes, preferred)
    }

    /// Open with a chosen extractor. `Extractor::ContentStream` never touches
    /// pdfium; `Extractor::Pdfium` still falls back to content streams when
    /// pdfium is unbound or disagrees about the page count.
    pub fn open_with(bytes: &[u8], preferred: Extractor) -> Result<Self> {
        if !is_pdf(bytes) {
            return Err(PdfError::NotPdf);
        }
        let doc = lopdf::Document::load_mem(bytes)?;
        let page_ids = doc.get_pages();

        let pdfium_text = if preferred == Extractor::Pdfium && pdfium::is_available() {
            match pdfium::extract_glyphs(bytes) {
                Ok(text) if text.pages.len() == page_ids.len() => Some(text),
                Ok(text) => {
                    log::warn!(
                        "[PdfDocument] pdfium saw {} pages, lopdf {}; using content streams",
                        text.pages.len(),
                        page_ids.len()
                    );
                    None
                }
                Err(e) => {
                    log::warn!("[PdfDocument] pdfium extraction failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut pages = Vec::with_capacity(page_ids.len());
        for (idx, (number, page_id)) in page_ids.into_iter().enumerate() {
            let page_box = get_page_box(&doc, page_id);
            let rotation = get_page_rotation(&doc, page_id);
            if rotation != 0 {
                log::debug!(
                    "[PdfDocument] page {} rotated {}, geometry stays unrotated",
                    number,
                    rotation
                );
            }

            let scanned = content::scan_page(&doc, page_id).unwrap_or_else(|e| {
                log::warn!("[PdfDocument] page {} content unreadable: {}", number, e);
                content::PageContent::default()
            });

            let glyphs = match &pdfium_text {
                Some(text) => text.pages[idx].clone(),
                None => content_glyphs(&page_box, &scanned.glyphs),
            };
            let images = scanned
                .images
                .iter()
                .filter_map(|r| user_rect_to_bbox(&page_box, r))
                .collect();

            pages.push(PageGeometry {
                page: Page {
                    page_number: number,
                    width: page_box.width(),
                    height: page_box.height(),
                },
                glyphs,
                images,
            });
        }

        let extractor = if pdfium_text.is_some() {
            Extractor::Pdfium
        } else {
            Extractor::ContentStream
        };
        log::info!(
            "[PdfDocument] loaded {} pages via {:?}",
            pages.len(),
            extractor
        );

        Ok(Self {
            pages,
            extractor,
            pdfium_text: pdfium_text.map(|t| t.text),
        })
    }

    pub fn extractor(&self) -> Extractor {
        self.extractor
    }

    /// Plain text of one page. Pdfium's text when available, otherwise the
    /// tokens joined line by line.
    pub fn page_text(&self, page: u32) -> Result<String> {
        let geometry = self.geometry(page)?;
        if let Some(text) = &self.pdfium_text {
            return Ok(text[(page - 1) as usize].clone());
        }

        let tokens = layout::glyphs_to_tokens(&geometry.glyphs);
        let mut out = String::new();
        let mut prev: Option<&Token> = None;
        for token in &tokens {
            if let Some(p) = prev {
                out.push(if p.same_line(token) { ' ' } else { '\n' });
            }
            out.push_str(&token.text);
            prev = Some(token);
        }
        Ok(out)
    }

    fn geometry(&self, page: u32) -> Result<&PageGeometry> {
        page.checked_sub(1)
            .and_then(|idx| self.pages.get(idx as usize))
            .ok_or(PdfError::PageNotFound(page))
    }
}

impl Document for PdfDocument {
    fn load(bytes: &[u8]) -> docshield_core::Result<Self> {
        Ok(Self::open(bytes)?)
    }

    fn get_pages(&self) -> docshield_core::Result<Vec<Page>> {
        Ok(self.pages.iter().map(|p| p.page).collect())
    }

    fn page_tokens(&self, page: u32) -> docshield_core::Result<Vec<Token>> {
        let geometry = self
            .geometry(page)
            .map_err(|_| CoreError::PageOutOfRange(page))?;
        Ok(layout::glyphs_to_tokens(&geometry.glyphs))
    }

    fn page_blocks(&self, page: u32) -> docshield_core::Result<Vec<ContentBlock>> {
        let geometry = self
            .geometry(page)
            .map_err(|_| CoreError::PageOutOfRange(page))?;
        let mut blocks = layout::text_blocks(&layout::glyphs_to_tokens(&geometry.glyphs));
        blocks.extend(geometry.images.iter().map(|bbox| ContentBlock {
            bbox: *bbox,
            kind: BlockKind::Image,
        }));
        Ok(blocks)
    }

    fn get_supported_features(&self) -> Vec<String> {
        let mut features = vec!["tokens".to_string(), "blocks".to_string()];
        if pdfium::is_available() {
            features.push("render".to_string());
            features.push("rasterize".to_string());
        }
        features
    }
}
