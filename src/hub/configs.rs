//! Config endpoints: snapshot and hot reload

use super::common::{ApiError, ApiResult};
use super::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

/// GET /configs - point-in-time view of the live tables
pub async fn get_configs(State(state): State<AppState>) -> Json<Value> {
    let tables = state.tunnel.tables();

    let rules: Vec<String> = tables.rules.iter().map(|r| r.describe()).collect();
    let mut proxies: Vec<String> = tables.proxies.keys().cloned().collect();
    proxies.sort();

    Json(json!({
        "rules": rules,
        "proxies": proxies,
    }))
}

/// PUT /configs - recompile the configuration document and swap tables.
/// On failure the previous tables stay live and the error is returned.
pub async fn reload_configs(State(state): State<AppState>) -> ApiResult<StatusCode> {
    info!("Reloading configuration");
    state
        .tunnel
        .update_config()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}
