//! PII detection over positioned tokens.
//!
//! Detection runs in two stages per page: single-token matchers over every
//! token, then the multi-token groupers over the ordered token stream. All
//! candidates pass through one [`DetectionSet`] that lives for exactly one
//! document call.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{DEDUP_VALUE_PREFIX, VALUE_MAX_CHARS};
use crate::document::{Document, Token};
use crate::geometry::BBox;

mod grouping;
mod heuristics;
pub mod normalize;

pub use grouping::{group_addresses, group_credit_cards, group_names};
pub use heuristics::PatternSet;

/// Detection label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiLabel {
    Email,
    Ssn,
    Phone,
    Dob,
    CreditCardLike,
    AddressLike,
    Name,
    Custom,
    Match,
}

impl PiiLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiLabel::Email => "email",
            PiiLabel::Ssn => "ssn",
            PiiLabel::Phone => "phone",
            PiiLabel::Dob => "dob",
            PiiLabel::CreditCardLike => "credit_card_like",
            PiiLabel::AddressLike => "address_like",
            PiiLabel::Name => "name",
            PiiLabel::Custom => "custom",
            PiiLabel::Match => "match",
        }
    }
}

/// One located PII span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiBox {
    pub page: u32,
    pub bbox: BBox,
    pub label: PiiLabel,
    pub value: String,
}

impl PiiBox {
    /// Build a detection; the stored value is cut to the first 120 characters.
    pub fn new(page: u32, bbox: BBox, label: PiiLabel, value: &str) -> Self {
        Self {
            page,
            bbox,
            label,
            value: value.chars().take(VALUE_MAX_CHARS).collect(),
        }
    }
}

type DedupKey = (u32, PiiLabel, [i64; 4], String);

/// Accumulates detections, collapsing candidates with the same page, label,
/// bbox at one-decimal precision and value prefix.
#[derive(Debug, Default)]
pub struct DetectionSet {
    seen: HashSet<DedupKey>,
    boxes: Vec<PiiBox>,
}

impl DetectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(b: &PiiBox) -> DedupKey {
        (
            b.page,
            b.label,
            b.bbox.rounded_key(),
            b.value.chars().take(DEDUP_VALUE_PREFIX).collect(),
        )
    }

    /// Add a candidate. Returns false when an equivalent one is already held.
    pub fn insert(&mut self, candidate: PiiBox) -> bool {
        if !self.seen.insert(Self::key(&candidate)) {
            return false;
        }
        self.boxes.push(candidate);
        true
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn into_boxes(self) -> Vec<PiiBox> {
        self.boxes
    }
}

/// Runs the matchers and groupers over pages of a document.
#[derive(Debug, Clone)]
pub struct Detector {
    patterns: Arc<PatternSet>,
    budget: Option<Duration>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(PatternSet::builtin())
    }
}

impl Detector {
    pub fn new(patterns: Arc<PatternSet>) -> Self {
        Self {
            patterns,
            budget: None,
        }
    }

    /// Bound one document call by wall-clock time. Pages not started before
    /// the budget runs out are skipped.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Detect PII on one page's tokens, accumulating into `set`.
    pub fn detect_page(&self, page: u32, tokens: &[Token], set: &mut DetectionSet) {
        let mut tokens: Vec<Token> = tokens.to_vec();
        tokens.sort_by_key(Token::order_key);

        for token in &tokens {
            if let Some(label) = self.patterns.classify_token(&token.text) {
                let value = match label {
                    PiiLabel::Email => normalize::strip_sentence_end(&token.text),
                    _ => normalize::normalize_token(&token.text),
                };
                set.insert(PiiBox::new(page, token.bbox, label, value));
            }
        }

        for candidate in group_credit_cards(page, &tokens)
            .into_iter()
            .chain(group_addresses(page, &tokens, &self.patterns))
            .chain(group_names(page, &tokens, &self.patterns))
        {
            set.insert(candidate);
        }
    }

    /// Detect PII on every page, in page order, with a fresh de-duplication
    /// set. Pages whose tokens cannot be produced are skipped.
    pub fn detect_document(&self, doc: &dyn Document) -> Vec<PiiBox> {
        let started = Instant::now();
        let mut set = DetectionSet::new();
        let page_count = doc.page_count();

        log::info!(
            "[Detection] scanning {} pages with patterns v{}",
            page_count,
            self.patterns.version()
        );

        for page in 1..=page_count {
            if let Some(budget) = self.budget {
                if started.elapsed() >= budget {
                    log::warn!(
                        "[Detection] budget of {:?} exhausted, skipping pages {}..={}",
                        budget,
                        page,
                        page_count
                    );
                    break;
                }
            }

            match doc.page_tokens(page) {
                Ok(tokens) => self.detect_page(page, &tokens, &mut set),
                Err(e) => log::warn!("[Detection] page {} tokens unavailable: {}", page, e),
            }
        }

        log::info!(
            "[Detection] {} detections in {:?}",
            set.len(),
            started.elapsed()
        );
        set.into_boxes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MemoryDocument, MemoryPage};

    fn tok(x0: f64, text: &str, line: u32, word: u32) -> Token {
        Token::new([x0, 100.0, x0 + 40.0, 112.0], text, 0, line, word).unwrap()
    }

    #[test]
    fn test_value_truncated() {
        let long = "x".repeat(300);
        let b = PiiBox::new(1, BBox::new(0.0, 0.0, 1.0, 1.0).unwrap(), PiiLabel::Custom, &long);
        assert_eq!(b.value.chars().count(), 120);
    }

    #[test]
    fn test_dedup_rounding() {
        let mut set = DetectionSet::new();
        let a = BBox::new(10.01, 10.0, 20.0, 20.0).unwrap();
        let b = BBox::new(10.04, 10.0, 20.0, 20.0).unwrap();
        assert!(set.insert(PiiBox::new(1, a, PiiLabel::Email, "a@b.co")));
        assert!(!set.insert(PiiBox::new(1, b, PiiLabel::Email, "a@b.co")));
        assert!(set.insert(PiiBox::new(2, a, PiiLabel::Email, "a@b.co")));
        assert!(set.insert(PiiBox::new(1, a, PiiLabel::Phone, "a@b.co")));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_dedup_value_prefix() {
        let mut set = DetectionSet::new();
        let bbox = BBox::new(0.0, 0.0, 5.0, 5.0).unwrap();
        let base = "a".repeat(32);
        assert!(set.insert(PiiBox::new(1, bbox, PiiLabel::Name, &format!("{base}XX"))));
        assert!(!set.insert(PiiBox::new(1, bbox, PiiLabel::Name, &format!("{base}YY"))));
    }

    #[test]
    fn test_detect_page_labels_tokens() {
        let tokens = vec![
            tok(0.0, "Email:", 0, 0),
            tok(50.0, "jane@example.com,", 0, 1),
            tok(0.0, "SSN", 1, 0),
            tok(50.0, "123-45-6789", 1, 1),
        ];
        let mut set = DetectionSet::new();
        Detector::default().detect_page(1, &tokens, &mut set);
        let boxes = set.into_boxes();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].label, PiiLabel::Email);
        assert_eq!(boxes[0].value, "jane@example.com");
        assert_eq!(boxes[0].bbox, tokens[1].bbox);
        assert_eq!(boxes[1].label, PiiLabel::Ssn);
    }

    #[test]
    fn test_sentence_final_email_detected() {
        let doc = MemoryDocument {
            pages: vec![MemoryPage {
                width: 612.0,
                height: 792.0,
                tokens: vec![
                    tok(0.0, "Contact", 0, 0),
                    tok(50.0, "jane@example.com.", 0, 1),
                ],
                blocks: None,
            }],
        };
        let boxes = Detector::default().detect_document(&doc);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].label, PiiLabel::Email);
        assert_eq!(boxes[0].value, "jane@example.com");
    }

    #[test]
    fn test_detect_document_scans_every_page() {
        let doc = MemoryDocument {
            pages: vec![
                MemoryPage {
                    width: 612.0,
                    height: 792.0,
                    tokens: vec![tok(0.0, "555-123-4567", 0, 0)],
                    blocks: None,
                },
                MemoryPage {
                    width: 612.0,
                    height: 792.0,
                    tokens: vec![tok(0.0, "555-123-4567", 0, 0)],
                    blocks: None,
                },
            ],
        };
        let boxes = Detector::default().detect_document(&doc);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].page, 1);
        assert_eq!(boxes[1].page, 2);
    }

    /// Serves tokens for every page except one.
    struct MissingPageDoc {
        missing: u32,
    }

    impl Document for MissingPageDoc {
        fn load(_bytes: &[u8]) -> crate::Result<Self> {
            Ok(Self { missing: 1 })
        }

        fn get_pages(&self) -> crate::Result<Vec<crate::document::Page>> {
            Ok((1..=2)
                .map(|page_number| crate::document::Page {
                    page_number,
                    width: 612.0,
                    height: 792.0,
                })
                .collect())
        }

        fn page_tokens(&self, page: u32) -> crate::Result<Vec<Token>> {
            if page == self.missing {
                return Err(crate::CoreError::Provider("no text layer".into()));
            }
            Ok(vec![tok(0.0, "555-123-4567", 0, 0)])
        }

        fn page_blocks(&self, _page: u32) -> crate::Result<Vec<crate::document::ContentBlock>> {
            Ok(Vec::new())
        }

        fn get_supported_features(&self) -> Vec<String> {
            vec!["tokens".to_string()]
        }
    }

    #[test]
    fn test_detect_document_skips_pages_without_tokens() {
        let doc = MissingPageDoc { missing: 1 };
        let boxes = Detector::default().detect_document(&doc);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].page, 2);
    }

    #[test]
    fn test_exhausted_budget_returns_partial_result() {
        let doc = MissingPageDoc { missing: 0 };
        let detector = Detector::default().with_budget(Duration::ZERO);
        assert!(detector.detect_document(&doc).is_empty());
    }

    #[test]
    fn test_generous_budget_scans_all_pages() {
        let doc = MemoryDocument {
            pages: vec![MemoryPage {
                width: 612.0,
                height: 792.0,
                tokens: vec![tok(0.0, "555-123-4567", 0, 0)],
                blocks: None,
            }],
        };
        let detector = Detector::default().with_budget(Duration::from_secs(60));
        assert_eq!(detector.detect_document(&doc).len(), 1);
    }

    #[test]
    fn test_label_serialization() {
        assert_eq!(
            serde_json::to_value(PiiLabel::CreditCardLike).unwrap(),
            serde_json::json!("credit_card_like")
        );
        assert_eq!(PiiLabel::AddressLike.as_str(), "address_like");
    }
}
