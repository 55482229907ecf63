use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::DeployError;
use crate::fingerprint::ClientFingerprint;
use crate::metrics::{
    DEPLOYS_REJECTED, DEPLOYS_SUCCEEDED, LEDGER_SIZE, PROVIDER_LATENCY, QUOTA_PROBES,
    REQUEST_TOTAL,
};
use crate::models::{DeployRequest, DeployResponse, QuotaProbeResponse};
use crate::provider::RelayError;
use crate::state::AppState;
use crate::validator::validate_request;

// Probe: report quota and cooldown, touch nothing else
fn quota_probe(state: &AppState, fingerprint: &str) -> QuotaProbeResponse {
    let status = state.ledger.status(fingerprint);
    QuotaProbeResponse {
        remaining_quota: status.remaining,
        cooldown: status.cooldown_remaining_secs.map(|_| true),
        remaining_seconds: status.cooldown_remaining_secs,
    }
}

// Accepts bare base64 or a data url, ignoring whitespace
fn decode_upload(file_data: &str) -> Result<Vec<u8>, DeployError> {
    let encoded = match file_data.split_once("base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => file_data,
    };
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    BASE64
        .decode(compact)
        .map_err(|_| DeployError::InvalidRequest("File data is not valid base64".to_string()))
}

pub async fn deploy_handler(
    State(state): State<Arc<AppState>>,
    ClientFingerprint(fingerprint): ClientFingerprint,
    payload: Result<Json<DeployRequest>, JsonRejection>,
) -> Result<Response, DeployError> {
    REQUEST_TOTAL.inc();

    let result = handle_deploy(&state, &fingerprint, payload).await;

    LEDGER_SIZE.set(state.ledger.len() as f64);
    if let Err(e) = &result {
        DEPLOYS_REJECTED.with_label_values(&[e.reason()]).inc();
    }
    result
}

async fn handle_deploy(
    state: &AppState,
    fingerprint: &str,
    payload: Result<Json<DeployRequest>, JsonRejection>,
) -> Result<Response, DeployError> {
    let Json(req) = payload?;

    if req.is_quota_check() {
        QUOTA_PROBES.inc();
        return Ok(Json(quota_probe(state, fingerprint)).into_response());
    }

    validate_request(&req)?;

    // one attempt per client at a time, from admission to charge
    let _attempt = state.ledger.lock(fingerprint).await;
    state.ledger.admit(fingerprint)?;

    let raw = decode_upload(&req.file_data)?;
    let files = state.sanitizer.process(&req.file_name, &raw)?;

    if !state.provider.has_credential() {
        error!("VERCEL_TOKEN is not set, refusing to deploy");
        return Err(DeployError::Configuration);
    }

    let start_time = Instant::now();
    let outcome = state.provider.deploy(&req.name, &files).await;
    PROVIDER_LATENCY.observe(start_time.elapsed().as_secs_f64());

    match outcome {
        Ok(deployment) => {
            let remaining = state.ledger.consume(fingerprint);
            DEPLOYS_SUCCEEDED.inc();
            info!(
                site = %req.name,
                deployment_id = ?deployment.id,
                files = files.len(),
                remaining,
                "Deployment created"
            );
            Ok(Json(DeployResponse {
                success: true,
                url: deployment.url,
                deployment_id: deployment.id,
                remaining_quota: remaining,
            })
            .into_response())
        }
        Err(e) if e.consumes_quota() => {
            let remaining = state.ledger.consume(fingerprint);
            info!(site = %req.name, remaining, error = %e, "Site name collision");
            Err(DeployError::NameTaken {
                remaining_quota: remaining,
            })
        }
        Err(RelayError::MissingCredential) => {
            error!("Provider credential disappeared before deploy");
            Err(DeployError::Configuration)
        }
        Err(e) => {
            warn!(site = %req.name, error = %e, "Deployment failed");
            Err(DeployError::Provider)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_and_data_url_uploads() {
        assert_eq!(decode_upload("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_upload("data:text/html;base64,aGVs\nbG8=").unwrap(),
            b"hello"
        );
    }

    #[test]
    fn rejects_non_base64_upload() {
        let err = decode_upload("not base64!!").unwrap_err();
        assert!(matches!(err, DeployError::InvalidRequest(_)));
    }
}
