use axum::extract::State;
use axum::Json;
use docshield_core::config::clamp_dpi;
use docshield_core::{
    assemble_plan, compute_signals, pick_figure_regions, route_pages, Document, PlanRequest,
    Region, RoutingOptions,
};
use docshield_pdf::{
    apply_plan, PdfDocument, RedactOptions, RedactionMode, RenderedImage, RenderedRegion,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{blocking, decode_document, encode_bytes, ApiError, ApiJson, ApiResult};
use crate::rules::expand_rules;
use crate::AppState;

const PNG_MIME: &str = "image/png";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DocumentRequest {
    pub document_b64: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderPagesRequest {
    pub document_b64: Option<String>,
    pub pages: Vec<Value>,
    pub dpi: Option<u32>,
}

/// Keep entries that are positive integers; anything else is skipped.
fn page_numbers(items: &[Value]) -> Vec<u32> {
    items
        .iter()
        .filter_map(Value::as_u64)
        .filter_map(|page| u32::try_from(page).ok())
        .filter(|page| *page >= 1)
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderRegionsRequest {
    pub document_b64: Option<String>,
    pub regions: Vec<Value>,
    pub dpi: Option<u32>,
}

fn page_image_json(image: &RenderedImage) -> Value {
    json!({
        "page": image.page,
        "mime": PNG_MIME,
        "width": image.width,
        "height": image.height,
        "data_b64": encode_bytes(&image.png),
    })
}

fn region_image_json(region: &RenderedRegion) -> Value {
    json!({
        "id": region.id,
        "page": region.page,
        "bbox": region.bbox,
        "mime": PNG_MIME,
        "data_b64": encode_bytes(&region.png),
    })
}

pub async fn extract(ApiJson(body): ApiJson<DocumentRequest>) -> ApiResult<Json<Value>> {
    let bytes = decode_document(body.document_b64.as_deref())?;
    let extraction = blocking(move || Ok(docshield_pdf::extract(&bytes)?)).await?;
    tracing::info!(
        pages = extraction.pages,
        blocks = extraction.blocks.len(),
        "extracted text"
    );
    Ok(Json(json!(extraction)))
}

pub async fn signals(ApiJson(body): ApiJson<DocumentRequest>) -> ApiResult<Json<Value>> {
    let bytes = decode_document(body.document_b64.as_deref())?;
    let page_signals = blocking(move || {
        let doc = PdfDocument::open(&bytes)?;
        Ok(compute_signals(&doc)?)
    })
    .await?;

    Ok(Json(json!({
        "pages": page_signals.len(),
        "page_signals": page_signals,
    })))
}

pub async fn render_pages(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RenderPagesRequest>,
) -> ApiResult<Json<Value>> {
    let bytes = decode_document(body.document_b64.as_deref())?;
    let dpi = clamp_dpi(body.dpi.or(Some(state.config.render_dpi)));
    let pages = page_numbers(&body.pages);

    let images =
        blocking(move || Ok(docshield_pdf::render_pages(&bytes, &pages, dpi)?)).await?;
    let images: Vec<Value> = images.iter().map(page_image_json).collect();
    Ok(Json(json!({ "images": images })))
}

pub async fn render_regions(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RenderRegionsRequest>,
) -> ApiResult<Json<Value>> {
    let bytes = decode_document(body.document_b64.as_deref())?;
    let dpi = clamp_dpi(body.dpi.or(Some(state.config.render_dpi)));
    let regions = Region::parse_list(&body.regions, state.config.max_boxes);

    let images =
        blocking(move || Ok(docshield_pdf::render_regions(&bytes, &regions, dpi)?)).await?;
    let images: Vec<Value> = images.iter().map(region_image_json).collect();
    Ok(Json(json!({ "images": images })))
}

pub async fn vision_plan(ApiJson(body): ApiJson<DocumentRequest>) -> ApiResult<Json<Value>> {
    let bytes = decode_document(body.document_b64.as_deref())?;
    let (routed, regions) = blocking(move || {
        let doc = PdfDocument::open(&bytes)?;
        let signals = compute_signals(&doc)?;
        let text_chars: Vec<usize> = (1..=doc.page_count())
            .map(|page| {
                doc.page_text(page)
                    .map(|text| text.trim().chars().count())
                    .unwrap_or(0)
            })
            .collect();

        let options = RoutingOptions::default();
        let routed = route_pages(&signals, &text_chars, &options);
        let regions = pick_figure_regions(&signals, &routed, &options);
        Ok((routed, regions))
    })
    .await?;

    tracing::info!(
        routed = routed.len(),
        regions = regions.len(),
        "vision plan built"
    );
    Ok(Json(json!({ "routed": routed, "regions": regions })))
}

/// Detect, plan and apply a redaction in one call.
pub async fn redact(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    let bytes = decode_document(body.get("document_b64").and_then(Value::as_str))?;

    let config = state.config.clone();
    let mode = match body.get("mode").and_then(Value::as_str) {
        Some(raw) => raw
            .parse::<RedactionMode>()
            .map_err(|_| ApiError::BadRequest("invalid_mode"))?,
        None => config.redact_mode,
    };
    let include_rules = body
        .get("include_rules")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let mut request =
        PlanRequest::from_value_with_limits(&body, config.max_boxes, config.max_search_queries)?;
    let rules = if include_rules {
        state.rules.list()
    } else {
        Vec::new()
    };
    let detector = state.detector.clone();

    let outcome = blocking(move || {
        let doc = PdfDocument::open(&bytes)?;
        if !rules.is_empty() {
            request.searches.extend(expand_rules(
                &rules,
                doc.page_count(),
                config.max_rules,
                config.max_search_queries,
            ));
            request.searches.truncate(config.max_search_queries);
        }

        let plan = assemble_plan(&doc, &request, &detector);
        let options = RedactOptions {
            dpi: config.render_dpi,
            jpeg_quality: config.jpeg_quality,
        };
        Ok(apply_plan(&bytes, &plan, mode, &options)?)
    })
    .await?;

    tracing::info!(
        applied = outcome.applied.len(),
        mode = ?outcome.mode,
        "redaction applied"
    );
    Ok(Json(json!({
        "ok": true,
        "document_b64": encode_bytes(&outcome.bytes),
        "applied_count": outcome.applied.len(),
        "applied": outcome.applied,
        "mode": outcome.mode,
    })))
}
