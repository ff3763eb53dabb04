//! Thin Axum control/event surface (§6): `/ws` event subscription and
//! `/api/control/*` lifecycle + config endpoints. Everything the Dynamic
//! Engine itself does is out of this module's reach -- it only talks to
//! `AppState`'s `EventBus` and `LifecycleController` handles.

pub mod routes;
pub mod ws;

use crate::state::AppState;
use axum::routing::{get, patch, post};
use axum::Router;
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/control/start", post(routes::start))
        .route("/api/control/stop", post(routes::stop))
        .route("/api/control/restart", post(routes::restart))
        .route("/api/control/config", get(routes::get_config).patch(routes::patch_config))
        .route("/api/control/running", get(routes::is_running))
        .route("/api/control/feature_toggles", patch(routes::update_feature_toggles))
        .route("/ws", get(ws::ws_handler))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
