//! Upload-and-deploy relay for static sites: per-client quota and cooldown,
//! archive filtering, then one call to the hosting provider.

pub mod clock;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod quota;
pub mod sanitizer;
pub mod state;
pub mod store;
pub mod validator;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{deploy_handler, health_handler, method_not_allowed, metrics_handler};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    // OPTIONS preflights are answered by the cors layer
    let deploy = post(deploy_handler).fallback(method_not_allowed);

    Router::new()
        .route("/api/deploy", deploy)
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
