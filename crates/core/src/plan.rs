//! Redaction plan assembly.
//!
//! Three sources of redaction intent are merged into one page-indexed plan:
//! detector output, caller-drawn regions and caller search queries resolved
//! against the page's tokens. Sources are concatenated in that order and
//! never de-duplicated against each other.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::{DEDUP_VALUE_PREFIX, MAX_CALLER_BOXES, MAX_SEARCH_QUERIES};
use crate::document::{Document, Token};
use crate::geometry::{self, BBox};
use crate::rules::{Detector, PiiBox};
use crate::{CoreError, Result};

pub const DEFAULT_REGION_LABEL: &str = "custom";
pub const DEFAULT_SEARCH_LABEL: &str = "match";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub page: u32,
    pub bbox: BBox,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub page: u32,
    pub text: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxSource {
    Detector,
    Region,
    Search,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedBox {
    pub page: u32,
    pub bbox: BBox,
    pub label: String,
    pub source: BoxSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Boxes to blacken, grouped by page in ascending page order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedactionPlan {
    pub pages: BTreeMap<u32, Vec<PlannedBox>>,
}

impl RedactionPlan {
    fn push(&mut self, planned: PlannedBox) {
        self.pages.entry(planned.page).or_default().push(planned);
    }

    pub fn boxes_for(&self, page: u32) -> &[PlannedBox] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedBox> {
        self.pages.values().flatten()
    }
}

// ============================================================================
// Caller input
// ============================================================================

fn positive_page(value: Option<&Value>) -> Option<u32> {
    let page = value?.as_u64()?;
    u32::try_from(page).ok().filter(|p| *p >= 1)
}

fn label_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Fetch an optional list field. Missing or null is empty; anything other
/// than an array is a client error.
fn list_field<'a>(body: &'a Value, field: &str) -> Result<&'a [Value]> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(CoreError::InvalidInput(format!("`{}` must be an array", field))),
    }
}

impl Region {
    /// Parse a list of `{id?, page, bbox, label?}` entries, skipping bad ones.
    pub fn parse_list(items: &[Value], limit: usize) -> Vec<Region> {
        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let page = positive_page(item.get("page"))?;
                let bbox = BBox::from_value(item.get("bbox")?)?;
                let id = item
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("region_{}", i + 1));
                Some(Region {
                    id,
                    page,
                    bbox,
                    label: label_or(item.get("label"), DEFAULT_REGION_LABEL),
                })
            })
            .take(limit)
            .collect()
    }
}

impl SearchQuery {
    /// Parse a list of `{page, text, label?}` entries, skipping bad ones.
    pub fn parse_list(items: &[Value], limit: usize) -> Vec<SearchQuery> {
        items
            .iter()
            .filter_map(|item| {
                let page = positive_page(item.get("page"))?;
                let text = item.get("text")?.as_str()?.trim();
                if text.is_empty() {
                    return None;
                }
                Some(SearchQuery {
                    page,
                    text: text.to_string(),
                    label: label_or(item.get("label"), DEFAULT_SEARCH_LABEL),
                })
            })
            .take(limit)
            .collect()
    }
}

/// Parsed redaction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub detect_pii: bool,
    pub regions: Vec<Region>,
    pub searches: Vec<SearchQuery>,
}

impl Default for PlanRequest {
    fn default() -> Self {
        Self {
            detect_pii: true,
            regions: Vec::new(),
            searches: Vec::new(),
        }
    }
}

impl PlanRequest {
    /// Parse `{boxes?, search_texts?, detect_pii?}` with the default caps.
    pub fn from_value(body: &Value) -> Result<Self> {
        Self::from_value_with_limits(body, MAX_CALLER_BOXES, MAX_SEARCH_QUERIES)
    }

    pub fn from_value_with_limits(
        body: &Value,
        max_boxes: usize,
        max_searches: usize,
    ) -> Result<Self> {
        let boxes = list_field(body, "boxes")?;
        let searches = list_field(body, "search_texts")?;
        Ok(Self {
            detect_pii: body
                .get("detect_pii")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            regions: Region::parse_list(boxes, max_boxes),
            searches: SearchQuery::parse_list(searches, max_searches),
        })
    }
}

// ============================================================================
// Text location
// ============================================================================

fn collapse_lower(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Find every occurrence of `query` within a page's lines.
///
/// Matching is case-insensitive on whitespace-collapsed text; an occurrence
/// never spans two lines. Each hit is the union of the tokens it touches.
pub fn locate_text(tokens: &[Token], query: &str) -> Vec<BBox> {
    let needle = collapse_lower(query);
    if needle.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&Token> = tokens.iter().collect();
    sorted.sort_by_key(|t| t.order_key());

    let mut hits = Vec::new();
    for line in sorted.chunk_by(|a, b| a.same_line(b)) {
        let mut haystack = String::new();
        let mut spans: Vec<(usize, usize)> = Vec::with_capacity(line.len());
        for token in line {
            let word = collapse_lower(&token.text);
            if word.is_empty() {
                continue;
            }
            if !haystack.is_empty() {
                haystack.push(' ');
            }
            let start = haystack.len();
            haystack.push_str(&word);
            spans.push((start, haystack.len()));
        }

        let words: Vec<&Token> = line
            .iter()
            .copied()
            .filter(|t| !collapse_lower(&t.text).is_empty())
            .collect();

        for (start, _) in haystack.match_indices(needle.as_str()) {
            let end = start + needle.len();
            let touched = spans
                .iter()
                .zip(&words)
                .filter(|((s, e), _)| *s < end && start < *e)
                .map(|(_, t)| &t.bbox);
            if let Some(bbox) = geometry::union(touched) {
                hits.push(bbox);
            }
        }
    }

    hits
}

// ============================================================================
// Assembly
// ============================================================================

type SourceKey = (u32, String, [i64; 4], String);

fn source_key(b: &PlannedBox) -> SourceKey {
    (
        b.page,
        b.label.clone(),
        b.bbox.rounded_key(),
        b.value
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(DEDUP_VALUE_PREFIX)
            .collect(),
    )
}

/// Collapses same-key duplicates within one source.
struct SourceSink<'a> {
    plan: &'a mut RedactionPlan,
    seen: HashSet<SourceKey>,
}

impl<'a> SourceSink<'a> {
    fn new(plan: &'a mut RedactionPlan) -> Self {
        Self {
            plan,
            seen: HashSet::new(),
        }
    }

    fn push(&mut self, planned: PlannedBox) {
        if self.seen.insert(source_key(&planned)) {
            self.plan.push(planned);
        }
    }
}

fn detector_box(b: PiiBox) -> PlannedBox {
    PlannedBox {
        page: b.page,
        bbox: b.bbox,
        label: b.label.as_str().to_string(),
        source: BoxSource::Detector,
        value: Some(b.value),
    }
}

/// Merge detector output, caller regions and search hits into one plan.
///
/// Entries pointing outside `1..=page_count` are dropped. Pages whose tokens
/// cannot be produced contribute no search hits.
pub fn assemble_plan(
    doc: &dyn Document,
    request: &PlanRequest,
    detector: &Detector,
) -> RedactionPlan {
    let page_count = doc.page_count();
    let in_range = |page: u32| (1..=page_count).contains(&page);
    let mut plan = RedactionPlan::default();

    if request.detect_pii {
        let mut sink = SourceSink::new(&mut plan);
        for b in detector.detect_document(doc) {
            sink.push(detector_box(b));
        }
    }

    {
        let mut sink = SourceSink::new(&mut plan);
        for region in request.regions.iter().filter(|r| in_range(r.page)) {
            sink.push(PlannedBox {
                page: region.page,
                bbox: region.bbox,
                label: region.label.clone(),
                source: BoxSource::Region,
                value: None,
            });
        }
    }

    {
        let mut token_cache: HashMap<u32, Vec<Token>> = HashMap::new();
        let mut sink = SourceSink::new(&mut plan);
        for query in request.searches.iter().filter(|q| in_range(q.page)) {
            let tokens = token_cache.entry(query.page).or_insert_with(|| {
                doc.page_tokens(query.page).unwrap_or_else(|e| {
                    log::warn!("[Plan] page {} tokens unavailable: {}", query.page, e);
                    Vec::new()
                })
            });
            for bbox in locate_text(tokens, &query.text) {
                sink.push(PlannedBox {
                    page: query.page,
                    bbox,
                    label: query.label.clone(),
                    source: BoxSource::Search,
                    value: Some(query.text.clone()),
                });
            }
        }
    }

    log::info!(
        "[Plan] {} boxes over {} pages (detect_pii={}, regions={}, searches={})",
        plan.total(),
        plan.pages.len(),
        request.detect_pii,
        request.regions.len(),
        request.searches.len()
    );
    plan
}
