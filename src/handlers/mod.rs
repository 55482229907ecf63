mod deploy;
mod health;
mod metrics;

use axum::{Json, http::StatusCode, response::IntoResponse};

use crate::models::ErrorResponse;

pub use deploy::deploy_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorResponse::new("Method not allowed")),
    )
}
