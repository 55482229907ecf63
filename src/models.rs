use serde::{Deserialize, Serialize};

// Site name that turns a deploy request into a read-only quota probe
pub const QUOTA_CHECK_NAME: &str = "quota-check";

// Deploy endpoint request format
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    #[serde(default)]
    pub name: String,
    // base64 encoded upload, empty for probes
    #[serde(default)]
    pub file_data: String,
    #[serde(default)]
    pub file_name: String,
}

impl DeployRequest {
    pub fn is_quota_check(&self) -> bool {
        self.name == QUOTA_CHECK_NAME
    }
}

// Quota probe response format
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaProbeResponse {
    pub remaining_quota: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
}

// Successful deploy response format
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    pub success: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    pub remaining_quota: u32,
}

// Error response format, shared by every failure status
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_quota: Option<u32>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Default::default()
        }
    }
}
