//! Named thresholds shared by the detection, signal and planning passes.

// ============================================================================
// Detection
// ============================================================================

/// Stored detection values are cut to this many characters.
pub const VALUE_MAX_CHARS: usize = 120;

/// Characters of the value that take part in the de-duplication key.
pub const DEDUP_VALUE_PREFIX: usize = 32;

/// Digits per group and groups per card for credit-card-like spans.
pub const CARD_GROUP_DIGITS: usize = 4;
pub const CARD_GROUP_COUNT: usize = 4;

/// Longest house number accepted as an address anchor.
pub const ADDRESS_MAX_NUMBER_DIGITS: usize = 6;
/// Tokens after the anchor searched for a street type.
pub const ADDRESS_LOOKAHEAD: usize = 8;
/// Smallest address group (number, street name, street type).
pub const ADDRESS_MIN_TOKENS: usize = 3;

pub const NAME_MAX_FRAGMENTS: usize = 5;
pub const NAME_MIN_FRAGMENTS: usize = 2;

// ============================================================================
// Page signals
// ============================================================================

/// Below this text coverage a page holding figures is treated as missing
/// figure content.
pub const FIGURE_TEXT_COVERAGE_CUTOFF: f64 = 0.05;

/// Lower bound for page area so degenerate pages never divide by zero.
pub const MIN_PAGE_AREA: f64 = 1.0;

// ============================================================================
// Vision routing
// ============================================================================

pub const ROUTE_IMAGE_COVERAGE: f64 = 0.25;
pub const ROUTE_FIGURE_COUNT: usize = 1;
pub const ROUTE_MIN_TEXT_CHARS_WITH_FIGURES: usize = 200;
pub const ROUTE_MAX_PAGES: usize = 12;
pub const ROUTE_MAX_REGIONS_PER_PAGE: usize = 3;
pub const ROUTE_MIN_REGION_AREA_PCT: f64 = 0.03;
pub const ROUTE_MIN_TOTAL_REGION_AREA_PCT: f64 = 0.15;

// ============================================================================
// Planning and text fallbacks
// ============================================================================

pub const MAX_CALLER_BOXES: usize = 200;
pub const MAX_SEARCH_QUERIES: usize = 120;

pub const PARAGRAPH_MAX_LINES: usize = 8;
pub const PARAGRAPH_SHORT_LINE: usize = 2;
pub const MAX_PARAGRAPHS: usize = 200;

// ============================================================================
// Rendering
// ============================================================================

pub const DEFAULT_RENDER_DPI: u32 = 220;
pub const MIN_RENDER_DPI: u32 = 72;
pub const MAX_RENDER_DPI: u32 = 600;

/// Clamp a requested DPI into the supported range.
pub fn clamp_dpi(dpi: Option<u32>) -> u32 {
    dpi.unwrap_or(DEFAULT_RENDER_DPI)
        .clamp(MIN_RENDER_DPI, MAX_RENDER_DPI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_dpi() {
        assert_eq!(clamp_dpi(None), 220);
        assert_eq!(clamp_dpi(Some(10)), 72);
        assert_eq!(clamp_dpi(Some(9000)), 600);
        assert_eq!(clamp_dpi(Some(150)), 150);
    }
}
