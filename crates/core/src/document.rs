//! Unified document interface.
//!
//! Every geometry provider implements [`Document`] so the detection, signal
//! and planning passes run the same way regardless of where positioned text
//! comes from.

use crate::geometry::BBox;
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Page dimensions in points. Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub width: f64,
    pub height: f64,
}

/// One positioned word.
///
/// Within a page, tokens are ordered by `(block_index, line_index, word_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub bbox: BBox,
    pub text: String,
    pub block_index: u32,
    pub line_index: u32,
    pub word_index: u32,
}

impl Token {
    /// Build a token from raw coordinates; malformed geometry yields `None`.
    pub fn new(
        coords: [f64; 4],
        text: impl Into<String>,
        block_index: u32,
        line_index: u32,
        word_index: u32,
    ) -> Option<Self> {
        let bbox = BBox::try_from(coords).ok()?;
        Some(Self {
            bbox,
            text: text.into(),
            block_index,
            line_index,
            word_index,
        })
    }

    pub fn order_key(&self) -> (u32, u32, u32) {
        (self.block_index, self.line_index, self.word_index)
    }

    pub fn same_line(&self, other: &Token) -> bool {
        self.block_index == other.block_index && self.line_index == other.line_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Image,
}

/// A layout block: a run of text or a placed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub bbox: BBox,
    pub kind: BlockKind,
}

/// Unified document interface.
pub trait Document: Send + Sync {
    /// Load a document from its raw bytes.
    fn load(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;

    /// Page sizes, in page order.
    fn get_pages(&self) -> Result<Vec<Page>>;

    /// Word tokens of one page, ordered by block, line and word.
    fn page_tokens(&self, page: u32) -> Result<Vec<Token>>;

    /// Text and image blocks of one page.
    fn page_blocks(&self, page: u32) -> Result<Vec<ContentBlock>>;

    /// Capability flags for callers, e.g. `tokens`, `blocks`, `render`.
    fn get_supported_features(&self) -> Vec<String>;

    fn page_count(&self) -> u32 {
        self.get_pages().map(|p| p.len() as u32).unwrap_or(0)
    }
}

// ============================================================================
// In-memory provider
// ============================================================================

/// Geometry supplied directly by a caller, e.g. from an upstream layout
/// service, serialized as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub pages: Vec<MemoryPage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPage {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub tokens: Vec<Token>,
    /// `None` means the provider could not extract blocks for this page.
    #[serde(default)]
    pub blocks: Option<Vec<ContentBlock>>,
}

impl MemoryDocument {
    fn page(&self, page: u32) -> Result<&MemoryPage> {
        page.checked_sub(1)
            .and_then(|idx| self.pages.get(idx as usize))
            .ok_or(CoreError::PageOutOfRange(page))
    }
}

impl Document for MemoryDocument {
    fn load(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn get_pages(&self) -> Result<Vec<Page>> {
        Ok(self
            .pages
            .iter()
            .enumerate()
            .map(|(i, p)| Page {
                page_number: i as u32 + 1,
                width: p.width,
                height: p.height,
            })
            .collect())
    }

    fn page_tokens(&self, page: u32) -> Result<Vec<Token>> {
        let mut tokens = self.page(page)?.tokens.clone();
        tokens.sort_by_key(Token::order_key);
        Ok(tokens)
    }

    fn page_blocks(&self, page: u32) -> Result<Vec<ContentBlock>> {
        self.page(page)?
            .blocks
            .clone()
            .ok_or_else(|| CoreError::Provider(format!("no block geometry for page {}", page)))
    }

    fn get_supported_features(&self) -> Vec<String> {
        vec!["tokens".to_string(), "blocks".to_string()]
    }
}
