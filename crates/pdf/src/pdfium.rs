//! Pdfium binding and character extraction.

use docshield_core::BBox;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use std::path::PathBuf;

use crate::layout::Glyph;
use crate::{PdfError, Result};

/// Extra directory to search for the pdfium library.
pub const PDFIUM_DIR_ENV: &str = "DOCSHIELD_PDFIUM_DIR";

fn get_pdfium_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(dir) = std::env::var(PDFIUM_DIR_ENV) {
        paths.push(PathBuf::from(dir));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.join("libs"));
            paths.push(exe_dir.to_path_buf());

            #[cfg(target_os = "macos")]
            {
                if let Some(contents_dir) = exe_dir.parent() {
                    paths.push(contents_dir.join("Resources").join("libs"));
                }
            }
        }
    }

    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));
    paths
}

/// Bind pdfium from the search paths, then from the system library.
pub fn bind_pdfium() -> Result<Pdfium> {
    for path in get_pdfium_search_paths() {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(&path);
        log::debug!("[Pdfium] trying {:?}", lib_path);

        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            log::info!("[Pdfium] loaded from {:?}", path);
            return Ok(Pdfium::new(bindings));
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| PdfError::PdfiumUnavailable(e.to_string()))
}

static AVAILABLE: Lazy<bool> = Lazy::new(|| match bind_pdfium() {
    Ok(_) => true,
    Err(e) => {
        log::warn!("[Pdfium] unavailable, falling back to content streams: {}", e);
        false
    }
});

/// Whether pdfium can be bound in this process. Checked once.
pub fn is_available() -> bool {
    *AVAILABLE
}

pub(crate) fn pdfium_err(context: &str, e: impl std::fmt::Display) -> PdfError {
    PdfError::Pdfium(format!("{}: {}", context, e))
}

/// Characters of every page, in top-left page coordinates.
pub struct PdfiumText {
    pub pages: Vec<Vec<Glyph>>,
    /// Plain text per page as pdfium reports it.
    pub text: Vec<String>,
}

/// Extract positioned characters from every page.
pub fn extract_glyphs(bytes: &[u8]) -> Result<PdfiumText> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| pdfium_err("load failed", e))?;

    let page_count = document.pages().len();
    let mut out = PdfiumText {
        pages: Vec::with_capacity(page_count as usize),
        text: Vec::with_capacity(page_count as usize),
    };

    for page_idx in 0..page_count {
        let page = document
            .pages()
            .get(page_idx)
            .map_err(|e| pdfium_err(&format!("page {}", page_idx + 1), e))?;
        let height = page.height().value as f64;
        let text_page = page
            .text()
            .map_err(|e| pdfium_err("text extraction failed", e))?;

        let mut glyphs = Vec::new();
        for char_info in text_page.chars().iter() {
            let Some(ch) = char_info.unicode_char() else {
                continue;
            };
            if ch.is_whitespace() || ch.is_control() {
                glyphs.push(Glyph::Break);
                continue;
            }
            let Ok(bounds) = char_info.loose_bounds() else {
                continue;
            };
            let bbox = BBox::new(
                bounds.left().value as f64,
                height - bounds.top().value as f64,
                bounds.right().value as f64,
                height - bounds.bottom().value as f64,
            );
            if let Some(bbox) = bbox {
                glyphs.push(Glyph::Char { ch, bbox });
            }
        }

        log::debug!(
            "[Pdfium] page {}: {} characters",
            page_idx + 1,
            glyphs.len()
        );
        out.pages.push(glyphs);
        out.text.push(text_page.all());
    }

    Ok(out)
}
