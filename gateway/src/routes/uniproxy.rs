//! Device WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::uniproxy::uniproxy_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the device WebSocket router
///
/// # Endpoint
///
/// `GET {path}` - WebSocket upgrade for the device protocol. The default path
/// is `/uniproxy.alice.yandex.net/uni.ws`.
pub fn create_uniproxy_router(path: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route(path, get(uniproxy_handler))
        .layer(TraceLayer::new_for_http())
}

/// All routes of the gateway, ready to serve.
pub fn create_app(state: Arc<AppState>) -> Router {
    let path = state.config.uniproxy_path.clone();
    super::api::create_api_router()
        .merge(create_uniproxy_router(&path))
        .with_state(state)
}
