//! Control-surface handlers (§6): `start(config)`, `stop()`,
//! `restart(config)`, `get_engine_config()`, `is_running()`,
//! `update_feature_toggles(...)`.

use crate::config::{EngineConfig, FeatureToggles};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

fn error_response(err: crate::errors::EngineError) -> Response {
    let status = match err {
        crate::errors::EngineError::AlreadyRunning => StatusCode::CONFLICT,
        crate::errors::EngineError::NotRunning => StatusCode::CONFLICT,
        crate::errors::EngineError::ConfigInvalid(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

pub async fn start(State(state): State<Arc<AppState>>, Json(cfg): Json<EngineConfig>) -> Response {
    match state.lifecycle.start(cfg).await {
        Ok(()) => Json(serde_json::json!({ "started": true })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Response {
    match state.lifecycle.stop().await {
        Ok(()) => Json(serde_json::json!({ "stopped": true })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn restart(State(state): State<Arc<AppState>>, Json(cfg): Json<EngineConfig>) -> Response {
    match state.lifecycle.restart(cfg).await {
        Ok(()) => Json(serde_json::json!({ "restarted": true })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<EngineConfig> {
    Json((*state.lifecycle.get_engine_config()).clone())
}

/// PATCH /api/control/config -- applies non-restart fields immediately;
/// reports `requires_restart: true` (and leaves the live value unchanged)
/// when the caller touched a field that needs a full restart (§4.6).
pub async fn patch_config(State(state): State<Arc<AppState>>, Json(cfg): Json<EngineConfig>) -> Response {
    match state.lifecycle.apply_live_config(cfg).await {
        Ok(true) => Json(serde_json::json!({ "applied": true, "requires_restart": false })).into_response(),
        Ok(false) => Json(serde_json::json!({ "applied": false, "requires_restart": true })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn is_running(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "running": state.is_running() }))
}

pub async fn update_feature_toggles(State(state): State<Arc<AppState>>, Json(toggles): Json<FeatureToggles>) -> Response {
    let mut cfg = (*state.lifecycle.get_engine_config()).clone();
    cfg.live.feature_toggles = toggles;
    match state.lifecycle.apply_live_config(cfg).await {
        Ok(applied) => Json(serde_json::json!({ "applied": applied })).into_response(),
        Err(e) => error_response(e),
    }
}
