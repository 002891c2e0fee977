//! Detect, plan and redact a synthesized form, then read it back.

use docshield_core::{
    assemble_plan, compute_signals, Detector, Document, PiiLabel, PlanRequest,
};
use docshield_pdf::{apply_plan, Extractor, PdfDocument, RedactOptions, RedactionMode};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use serde_json::json;

fn form_pdf(lines: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut operations = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new(
            "Td",
            vec![72.into(), Object::Integer(700 - 20 * i as i64)],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        Content { operations }.encode().unwrap(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn page_strings(bytes: &[u8]) -> Vec<String> {
    let doc = lopdf::Document::load_mem(bytes).unwrap();
    let page_id = *doc.get_pages().get(&1).unwrap();
    let data = doc.get_page_content(page_id).unwrap();
    Content::decode(&data)
        .unwrap()
        .operations
        .into_iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| match op.operands.into_iter().next() {
            Some(Object::String(s, _)) => Some(String::from_utf8_lossy(&s).into_owned()),
            _ => None,
        })
        .collect()
}

#[test]
fn detected_email_is_scrubbed_from_content() {
    let bytes = form_pdf(&["Contact: jane@example.com", "Applicant: Jane Doe"]);
    // Glyph boxes from pdfium follow real font metrics; the assertions below
    // assume the estimated widths of the content-stream walker.
    let doc = PdfDocument::open_with(&bytes, Extractor::ContentStream).unwrap();
    let before = compute_signals(&doc).unwrap();

    let request = PlanRequest::default();
    let plan = assemble_plan(&doc, &request, &Detector::default());
    let labels: Vec<&str> = plan.iter().map(|b| b.label.as_str()).collect();
    assert!(labels.contains(&PiiLabel::Email.as_str()));
    assert!(labels.contains(&PiiLabel::Name.as_str()));

    let outcome = apply_plan(
        &bytes,
        &plan,
        RedactionMode::Overlay,
        &RedactOptions::default(),
    )
    .unwrap();
    assert_eq!(outcome.applied.len(), plan.total());

    let strings = page_strings(&outcome.bytes);
    assert!(strings[0].starts_with("Contact:"));
    assert!(!strings[0].contains("jane@example.com"));
    assert!(strings[1].starts_with("Applicant:"));
    assert!(!strings[1].contains("Jane"));

    // The redacted document still parses and re-detects nothing.
    let reopened = PdfDocument::open_with(&outcome.bytes, Extractor::ContentStream).unwrap();
    assert!(Detector::default().detect_document(&reopened).is_empty());
    let after = compute_signals(&reopened).unwrap();
    assert_eq!(after.len(), 1);
    // How far coverage drops depends on the geometry backend; it never grows
    // once redacted text has left the content stream.
    assert!(after[0].text_coverage <= before[0].text_coverage + 1e-9);
}

#[test]
fn search_text_and_caller_box_are_planned() {
    let bytes = form_pdf(&["Project Falcon budget"]);
    let doc = PdfDocument::open(&bytes).unwrap();
    assert_eq!(doc.page_count(), 1);

    let body = json!({
        "detect_pii": false,
        "boxes": [{"page": 1, "bbox": [0, 0, 40, 40], "label": "logo"}],
        "search_texts": [{"page": 1, "text": "nowhere"}]
    });
    let request = PlanRequest::from_value(&body).unwrap();
    let plan = assemble_plan(&doc, &request, &Detector::default());
    assert_eq!(plan.total(), 1);
    assert_eq!(plan.boxes_for(1)[0].label, "logo");
}
