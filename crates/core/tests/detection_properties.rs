//! End-to-end properties of detection, signals and planning over an
//! in-memory document.

use docshield_core::document::{MemoryDocument, MemoryPage};
use docshield_core::{
    assemble_plan, compute_signals, geometry::clamp01, BBox, BlockKind, BoxSource,
    ContentBlock, Detector, Document, PiiLabel, PlanRequest, Token,
};
use serde_json::json;

fn line(words: &[&str], block: u32, line: u32) -> Vec<Token> {
    let y0 = 100.0 + line as f64 * 16.0;
    words
        .iter()
        .enumerate()
        .map(|(w, text)| {
            let x0 = 72.0 + w as f64 * 60.0;
            Token::new([x0, y0, x0 + 55.0, y0 + 12.0], *text, block, line, w as u32).unwrap()
        })
        .collect()
}

fn form_page() -> MemoryPage {
    let mut tokens = Vec::new();
    tokens.extend(line(&["Applicant:", "Jane", "Q.", "Doe"], 0, 0));
    tokens.extend(line(&["Email:", "jane@example.com"], 0, 1));
    tokens.extend(line(&["Card", "4111", "1111", "1111", "1111"], 0, 2));
    tokens.extend(line(&["Home", "742", "Evergreen", "Terrace"], 0, 3));
    tokens.extend(line(&["DOB", "04/12/1988", "Phone", "(555)", "123-4567"], 0, 4));
    MemoryPage {
        width: 612.0,
        height: 792.0,
        tokens,
        blocks: Some(vec![ContentBlock {
            bbox: BBox::new(72.0, 100.0, 400.0, 180.0).unwrap(),
            kind: BlockKind::Text,
        }]),
    }
}

#[test]
fn detects_every_category_on_a_form() {
    let doc = MemoryDocument {
        pages: vec![form_page()],
    };
    let boxes = Detector::default().detect_document(&doc);
    let labels: Vec<PiiLabel> = boxes.iter().map(|b| b.label).collect();

    assert!(labels.contains(&PiiLabel::Name));
    assert!(labels.contains(&PiiLabel::Email));
    assert!(labels.contains(&PiiLabel::CreditCardLike));
    assert!(labels.contains(&PiiLabel::AddressLike));
    assert!(labels.contains(&PiiLabel::Dob));

    let name = boxes.iter().find(|b| b.label == PiiLabel::Name).unwrap();
    assert_eq!(name.value, "Jane Q. Doe");
    let card = boxes
        .iter()
        .find(|b| b.label == PiiLabel::CreditCardLike)
        .unwrap();
    assert_eq!(card.value, "4111 1111 1111 1111");
    let address = boxes
        .iter()
        .find(|b| b.label == PiiLabel::AddressLike)
        .unwrap();
    assert_eq!(address.value, "742 Evergreen Terrace");
}

#[test]
fn repeated_token_yields_one_detection() {
    let token = Token::new([10.0, 10.0, 90.0, 22.0], "jane@example.com", 0, 0, 0).unwrap();
    let mut twin = token.clone();
    twin.bbox = BBox::new(10.04, 10.0, 90.0, 22.0).unwrap();
    twin.word_index = 1;
    let doc = MemoryDocument {
        pages: vec![MemoryPage {
            width: 612.0,
            height: 792.0,
            tokens: vec![token, twin],
            blocks: None,
        }],
    };
    assert_eq!(Detector::default().detect_document(&doc).len(), 1);
}

#[test]
fn each_document_call_starts_fresh() {
    let doc = MemoryDocument {
        pages: vec![form_page()],
    };
    let detector = Detector::default();
    let first = detector.detect_document(&doc);
    let second = detector.detect_document(&doc);
    assert_eq!(first, second);
}

#[test]
fn signals_degrade_when_blocks_missing() {
    let mut missing = form_page();
    missing.blocks = None;
    let doc = MemoryDocument {
        pages: vec![form_page(), missing],
    };
    let signals = compute_signals(&doc).unwrap();
    assert_eq!(signals.len(), 2);
    assert!(signals[0].text_coverage > 0.0);
    let s = &signals[1];
    assert_eq!(s.text_coverage, 0.0);
    assert_eq!(s.figure_count, 0);
    assert!(s.image_boxes.is_empty());
    assert_eq!(s.width, 612.0);
}

#[test]
fn coverage_values_stay_in_unit_range() {
    let doc = MemoryDocument {
        pages: vec![form_page()],
    };
    for s in compute_signals(&doc).unwrap() {
        for v in [s.text_coverage, s.image_coverage, s.non_text_coverage] {
            assert_eq!(clamp01(v), v);
        }
    }
}

#[test]
fn plan_from_json_request() {
    let doc = MemoryDocument::load(
        serde_json::to_vec(&MemoryDocument {
            pages: vec![form_page()],
        })
        .unwrap()
        .as_slice(),
    )
    .unwrap();

    let body = json!({
        "boxes": [{"page": 1, "bbox": [0, 0, 50, 50], "label": "signature"},
                  {"page": 5, "bbox": [0, 0, 50, 50]}],
        "search_texts": [{"page": 1, "text": "evergreen terrace", "label": "user_rule"},
                         {"page": 1, "text": "not on the page"}],
        "detect_pii": false
    });
    let request = PlanRequest::from_value(&body).unwrap();
    let plan = assemble_plan(&doc, &request, &Detector::default());

    let boxes = plan.boxes_for(1);
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[0].source, BoxSource::Region);
    assert_eq!(boxes[0].label, "signature");
    assert_eq!(boxes[1].source, BoxSource::Search);
    assert_eq!(boxes[1].label, "user_rule");
    assert_eq!(boxes[1].bbox, BBox::new(192.0, 148.0, 307.0, 160.0).unwrap());
}
