// Request errors, one status code and ErrorResponse body each

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::quota::QuotaDenied;
use crate::sanitizer::SanitizeError;
use crate::validator::ValidationError;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error("Please wait before deploying again")]
    Cooldown {
        remaining_secs: u64,
        remaining_quota: u32,
    },

    #[error("Daily deploy quota exhausted")]
    QuotaExhausted,

    #[error("Site name is already taken, try another name")]
    NameTaken { remaining_quota: u32 },

    #[error("Deployment failed. Try again later.")]
    Provider,

    #[error("Server configuration is incomplete. Contact the administrator.")]
    Configuration,
}

impl From<QuotaDenied> for DeployError {
    fn from(denied: QuotaDenied) -> Self {
        match denied {
            QuotaDenied::Cooldown {
                remaining_secs,
                remaining_quota,
            } => Self::Cooldown {
                remaining_secs,
                remaining_quota,
            },
            QuotaDenied::Exhausted => Self::QuotaExhausted,
        }
    }
}

impl From<JsonRejection> for DeployError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl DeployError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Validation(_) | Self::Sanitize(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NameTaken { .. } => StatusCode::BAD_REQUEST,
            Self::Cooldown { .. } | Self::QuotaExhausted => StatusCode::TOO_MANY_REQUESTS,
            Self::Provider | Self::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::Validation(_) => "invalid_request",
            Self::Sanitize(e) if e.is_policy() => "policy",
            Self::Sanitize(_) => "invalid_upload",
            Self::Cooldown { .. } => "cooldown",
            Self::QuotaExhausted => "quota_exhausted",
            Self::NameTaken { .. } => "name_taken",
            Self::Provider => "provider",
            Self::Configuration => "configuration",
        }
    }

    fn body(&self) -> ErrorResponse {
        let mut body = ErrorResponse::new(self.to_string());
        match self {
            Self::Cooldown {
                remaining_secs,
                remaining_quota,
            } => {
                body.cooldown = Some(true);
                body.remaining_seconds = Some(*remaining_secs);
                body.remaining_quota = Some(*remaining_quota);
            }
            Self::QuotaExhausted => body.remaining_quota = Some(0),
            Self::NameTaken { remaining_quota } => body.remaining_quota = Some(*remaining_quota),
            _ => {}
        }
        body
    }
}

impl IntoResponse for DeployError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
