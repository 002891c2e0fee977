//! Raw text extraction: pdfium first, content streams as the fallback.

use docshield_core::config::MAX_PARAGRAPHS;
use docshield_core::{text_to_paragraphs, Document};
use serde::{Deserialize, Serialize};

use crate::{Extractor, PdfDocument, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub pages: u32,
    pub text: String,
    pub blocks: Vec<TextBlock>,
    pub extractor: Extractor,
}

fn clean_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Extract the document's text as lines and per-page paragraphs.
pub fn extract(bytes: &[u8]) -> Result<Extraction> {
    let doc = PdfDocument::open(bytes)?;
    let pages = doc.page_count();

    let mut all_lines = Vec::new();
    let mut blocks = Vec::new();
    for page in 1..=pages {
        let text = doc.page_text(page)?;
        let lines = clean_lines(&text);
        if blocks.len() < MAX_PARAGRAPHS {
            blocks.extend(text_to_paragraphs(&text).into_iter().map(|text| TextBlock {
                text,
                page: Some(page),
            }));
        }
        all_lines.extend(lines.into_iter().map(str::to_string));
    }
    blocks.truncate(MAX_PARAGRAPHS);

    log::info!(
        "[Extract] {} pages, {} lines, {} paragraphs via {:?}",
        pages,
        all_lines.len(),
        blocks.len(),
        doc.extractor()
    );

    Ok(Extraction {
        pages,
        text: all_lines.join("\n"),
        blocks,
        extractor: doc.extractor(),
    })
}
