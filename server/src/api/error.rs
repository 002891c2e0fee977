use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use docshield_core::CoreError;
use docshield_pdf::PdfError;
use serde_json::json;

use crate::rules::RuleError;

/// Error returned by every handler, rendered as `{ok: false, error, detail?}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Client error with a stable machine-readable code.
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{code}: {detail}")]
    Internal { code: &'static str, detail: String },

    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Rule(#[from] RuleError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            ApiError::BadRequest(code) => (StatusCode::BAD_REQUEST, *code, None),
            ApiError::Internal { code, detail } => {
                (StatusCode::INTERNAL_SERVER_ERROR, *code, Some(detail.clone()))
            }
            ApiError::Json(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", None)
            }
            ApiError::Json(e) => (StatusCode::BAD_REQUEST, "invalid_json", Some(e.body_text())),
            ApiError::Core(CoreError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            ApiError::Core(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "processing_failed",
                Some(e.to_string()),
            ),
            ApiError::Pdf(PdfError::NotPdf) => (StatusCode::BAD_REQUEST, "pdf_required", None),
            ApiError::Pdf(e @ PdfError::Parse(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_pdf", Some(e.to_string()))
            }
            ApiError::Pdf(e @ PdfError::PdfiumUnavailable(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "renderer_unavailable",
                Some(e.to_string()),
            ),
            ApiError::Pdf(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "pdf_failed",
                Some(e.to_string()),
            ),
            ApiError::Rule(RuleError::NotFound) => (StatusCode::NOT_FOUND, "not_found", None),
            ApiError::Rule(e @ (RuleError::Io(_) | RuleError::Json(_))) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "rules_store_failed",
                Some(e.to_string()),
            ),
            ApiError::Rule(RuleError::MissingText) => {
                (StatusCode::BAD_REQUEST, "missing_text", None)
            }
            ApiError::Rule(RuleError::TextTooLong) => {
                (StatusCode::BAD_REQUEST, "text_too_long", None)
            }
            ApiError::Rule(RuleError::MissingId) => (StatusCode::BAD_REQUEST, "missing_id", None),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, detail) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let mut body = json!({ "ok": false, "error": code });
        if let Some(detail) = detail {
            body["detail"] = json!(detail);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::BadRequest("missing_document"), 400, "missing_document"),
            (ApiError::Pdf(PdfError::NotPdf), 400, "pdf_required"),
            (
                ApiError::Core(CoreError::InvalidInput("`boxes` must be an array".into())),
                400,
                "invalid_request",
            ),
            (ApiError::Rule(RuleError::NotFound), 404, "not_found"),
            (
                ApiError::Pdf(PdfError::Pdfium("boom".into())),
                500,
                "pdf_failed",
            ),
        ];
        for (err, status, code) in cases {
            let (s, c, _) = err.parts();
            assert_eq!(s.as_u16(), status);
            assert_eq!(c, code);
        }
    }
}
