use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiJson, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddRuleRequest {
    pub text: String,
    pub label: Option<String>,
}

pub async fn list_rules(State(state): State<AppState>) -> Json<Value> {
    let rules = state.rules.list();
    Json(json!({ "count": rules.len(), "rules": rules }))
}

pub async fn add_rule(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AddRuleRequest>,
) -> ApiResult<Json<Value>> {
    let rule = state.rules.add(&body.text, body.label.as_deref())?;
    Ok(Json(json!({ "ok": true, "rule": rule })))
}

pub async fn remove_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let rule = state.rules.remove(&id)?;
    Ok(Json(json!({ "ok": true, "rule": rule })))
}
