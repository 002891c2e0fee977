//! Routes, shared request helpers and the error envelope.

mod error;
mod pdf;
mod rules;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, Request};
use axum::routing::{delete, get, post};
use axum::{async_trait, Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use crate::AppState;

pub use error::{ApiError, ApiResult};

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_body_mb * 1024 * 1024;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/extract", post(pdf::extract))
        .route("/api/pdf/signals", post(pdf::signals))
        .route("/api/pdf/render-pages", post(pdf::render_pages))
        .route("/api/pdf/render-regions", post(pdf::render_regions))
        .route("/api/pdf/vision-plan", post(pdf::vision_plan))
        .route("/api/pdf/redact", post(pdf::redact))
        .route(
            "/api/redaction-rules",
            get(rules::list_rules).post(rules::add_rule),
        )
        .route("/api/redaction-rules/:id", delete(rules::remove_rule))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "pdfium": docshield_pdf::pdfium::is_available(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `Json` extractor whose rejections use the `{ok: false, error}` envelope.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Decode a `document_b64` field. A `data:` URL prefix is accepted.
pub(crate) fn decode_document(encoded: Option<&str>) -> ApiResult<Vec<u8>> {
    let encoded = encoded
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::BadRequest("missing_document"))?;
    let payload = match encoded.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => encoded,
    };
    STANDARD
        .decode(payload)
        .map_err(|_| ApiError::BadRequest("invalid_base64"))
}

pub(crate) fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Run PDF work on the blocking pool.
pub(crate) async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal {
            code: "task_failed",
            detail: e.to_string(),
        })?
}
