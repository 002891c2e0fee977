//! Core engine for geometric PII detection and redaction planning.
//!
//! Collaborators feed positioned word tokens and content blocks through the
//! [`Document`] trait. The engine turns them into typed detections, per-page
//! layout signals and page-indexed redaction plans. It never parses PDF bytes
//! and never touches pixels.

pub mod config;
pub mod document;
pub mod geometry;
pub mod paragraphs;
pub mod plan;
pub mod rules;
pub mod signals;

pub use document::{BlockKind, ContentBlock, Document, Page, Token};
pub use geometry::BBox;
pub use paragraphs::{text_to_paragraphs, to_paragraphs};
pub use plan::{
    assemble_plan, locate_text, BoxSource, PlanRequest, PlannedBox, RedactionPlan, Region,
    SearchQuery,
};
pub use rules::{Detector, DetectionSet, PatternSet, PiiBox, PiiLabel};
pub use signals::{
    compute_page_signal, compute_signals, pick_figure_regions, route_pages, ImageBox, PageSignal,
    RoutedPage, RoutingOptions, RoutingReason, VisionRegion,
};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid pattern `{name}`: {source}")]
    InvalidPattern {
        name: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("page {0} is out of range")]
    PageOutOfRange(u32),
    #[error("geometry provider failed: {0}")]
    Provider(String),
}
