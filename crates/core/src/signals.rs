//! Per-page layout signals and vision routing.
//!
//! Signals are area ratios computed from a page's text and image blocks.
//! Routing turns a document's signals into the pages and figure regions worth
//! sending to a vision model.

use serde::{Deserialize, Serialize};

use crate::config::{
    FIGURE_TEXT_COVERAGE_CUTOFF, MIN_PAGE_AREA, ROUTE_FIGURE_COUNT, ROUTE_IMAGE_COVERAGE,
    ROUTE_MAX_PAGES, ROUTE_MAX_REGIONS_PER_PAGE, ROUTE_MIN_REGION_AREA_PCT,
    ROUTE_MIN_TEXT_CHARS_WITH_FIGURES, ROUTE_MIN_TOTAL_REGION_AREA_PCT,
};
use crate::document::{BlockKind, ContentBlock, Document, Page};
use crate::geometry::{clamp01, BBox};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBox {
    pub bbox: BBox,
    pub area_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSignal {
    pub page: u32,
    pub width: f64,
    pub height: f64,
    pub text_coverage: f64,
    pub image_coverage: f64,
    pub non_text_coverage: f64,
    pub figure_count: usize,
    pub figure_content_missing: bool,
    pub image_boxes: Vec<ImageBox>,
}

impl PageSignal {
    /// Signal for a page whose blocks could not be extracted.
    pub fn empty(page: u32, width: f64, height: f64) -> Self {
        Self {
            page,
            width,
            height,
            text_coverage: 0.0,
            image_coverage: 0.0,
            non_text_coverage: 0.0,
            figure_count: 0,
            figure_content_missing: false,
            image_boxes: Vec::new(),
        }
    }
}

/// Compute the signal of one page from its blocks.
pub fn compute_page_signal(page: &Page, blocks: &[ContentBlock]) -> PageSignal {
    let page_area = (page.width * page.height).max(MIN_PAGE_AREA);
    let mut text_area = 0.0;
    let mut image_area = 0.0;
    let mut image_boxes = Vec::new();

    for block in blocks {
        let area = block.bbox.area();
        match block.kind {
            BlockKind::Text => text_area += area,
            BlockKind::Image => {
                image_area += area;
                image_boxes.push(ImageBox {
                    bbox: block.bbox,
                    area_pct: clamp01(area / page_area),
                });
            }
        }
    }

    let text_coverage = clamp01(text_area / page_area);
    let image_coverage = clamp01(image_area / page_area);
    let figure_count = image_boxes.len();

    PageSignal {
        page: page.page_number,
        width: page.width,
        height: page.height,
        text_coverage,
        image_coverage,
        non_text_coverage: clamp01(1.0 - text_coverage),
        figure_count,
        figure_content_missing: figure_count > 0 && text_coverage < FIGURE_TEXT_COVERAGE_CUTOFF,
        image_boxes,
    }
}

/// Compute signals for every page. A page whose blocks fail to extract
/// degrades to an empty signal instead of failing the document.
pub fn compute_signals(doc: &dyn Document) -> crate::Result<Vec<PageSignal>> {
    let pages = doc.get_pages()?;
    let signals = pages
        .iter()
        .map(|page| match doc.page_blocks(page.page_number) {
            Ok(blocks) => compute_page_signal(page, &blocks),
            Err(e) => {
                log::warn!(
                    "[Signals] page {} blocks unavailable: {}",
                    page.page_number,
                    e
                );
                PageSignal::empty(page.page_number, page.width, page.height)
            }
        })
        .collect();
    Ok(signals)
}

// ============================================================================
// Vision routing
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingReason {
    HighImageCoverage,
    FigureCount,
    FigureContentMissing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingOptions {
    pub image_coverage_threshold: f64,
    pub figure_count_threshold: usize,
    pub min_text_chars_with_figures: usize,
    pub max_pages: usize,
    pub max_regions_per_page: usize,
    pub min_region_area_pct: f64,
    pub min_total_region_area_pct: f64,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            image_coverage_threshold: ROUTE_IMAGE_COVERAGE,
            figure_count_threshold: ROUTE_FIGURE_COUNT,
            min_text_chars_with_figures: ROUTE_MIN_TEXT_CHARS_WITH_FIGURES,
            max_pages: ROUTE_MAX_PAGES,
            max_regions_per_page: ROUTE_MAX_REGIONS_PER_PAGE,
            min_region_area_pct: ROUTE_MIN_REGION_AREA_PCT,
            min_total_region_area_pct: ROUTE_MIN_TOTAL_REGION_AREA_PCT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedPage {
    pub page: u32,
    pub reasons: Vec<RoutingReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionRegion {
    pub id: String,
    pub page: u32,
    pub bbox: BBox,
    pub area_pct: f64,
}

/// Pick the pages that merit vision reprocessing.
///
/// `text_chars` holds the extracted text length per page, indexed by page
/// number minus one; missing entries count as zero.
pub fn route_pages(
    signals: &[PageSignal],
    text_chars: &[usize],
    options: &RoutingOptions,
) -> Vec<RoutedPage> {
    signals
        .iter()
        .filter_map(|s| {
            let chars = text_chars
                .get(s.page.saturating_sub(1) as usize)
                .copied()
                .unwrap_or(0);
            let mut reasons = Vec::new();
            if s.image_coverage >= options.image_coverage_threshold {
                reasons.push(RoutingReason::HighImageCoverage);
            }
            if s.figure_count >= options.figure_count_threshold.max(1) {
                reasons.push(RoutingReason::FigureCount);
            }
            if s.figure_content_missing
                || (s.figure_count > 0 && chars < options.min_text_chars_with_figures)
            {
                reasons.push(RoutingReason::FigureContentMissing);
            }
            (!reasons.is_empty()).then_some(RoutedPage {
                page: s.page,
                reasons,
            })
        })
        .take(options.max_pages)
        .collect()
}

/// Pick figure regions for the routed pages, largest first. Pages whose
/// picked regions cover too little of the page also get a full-page region.
pub fn pick_figure_regions(
    signals: &[PageSignal],
    routed: &[RoutedPage],
    options: &RoutingOptions,
) -> Vec<VisionRegion> {
    let mut regions = Vec::new();

    for route in routed {
        let Some(signal) = signals.iter().find(|s| s.page == route.page) else {
            continue;
        };

        let mut figures: Vec<&ImageBox> = signal
            .image_boxes
            .iter()
            .filter(|b| b.area_pct >= options.min_region_area_pct)
            .collect();
        figures.sort_by(|a, b| b.area_pct.total_cmp(&a.area_pct));

        let mut total = 0.0;
        for (i, figure) in figures
            .into_iter()
            .take(options.max_regions_per_page)
            .enumerate()
        {
            total += figure.area_pct;
            regions.push(VisionRegion {
                id: format!("p{}_fig{}", route.page, i + 1),
                page: route.page,
                bbox: figure.bbox,
                area_pct: figure.area_pct,
            });
        }

        if total < options.min_total_region_area_pct {
            if let Some(full) = BBox::new(0.0, 0.0, signal.width, signal.height) {
                regions.push(VisionRegion {
                    id: format!("p{}_full", route.page),
                    page: route.page,
                    bbox: full,
                    area_pct: 1.0,
                });
            }
        }
    }

    regions
}
