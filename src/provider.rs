// One deployment call per attempt, no build step, no retries

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::sanitizer::FileEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    NameTaken,
    Other,
}

/// Failure details reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderRejection {
    pub status: u16,
    pub code: Option<String>,
    pub message: Option<String>,
}

impl fmt::Display for ProviderRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, ", code {}", code)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

pub type Classifier = Arc<dyn Fn(&ProviderRejection) -> FailureClass + Send + Sync>;

// Substring match on the provider's code and message
pub fn classify_by_message(rejection: &ProviderRejection) -> FailureClass {
    let mentions_collision = |text: &str| {
        let text = text.to_lowercase();
        text.contains("already exists") || text.contains("duplicate")
    };

    let code_hit = rejection
        .code
        .as_deref()
        .is_some_and(|c| c == "name_already_exists" || mentions_collision(c));
    let message_hit = rejection.message.as_deref().is_some_and(mentions_collision);

    if code_hit || message_hit {
        FailureClass::NameTaken
    } else {
        FailureClass::Other
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("provider credential is not configured")]
    MissingCredential,
    #[error("site name already taken ({0})")]
    NameTaken(ProviderRejection),
    #[error("provider rejected deployment ({0})")]
    Rejected(ProviderRejection),
    #[error("deployment request timed out after {0:?}")]
    Timeout(Duration),
    #[error("deployment request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl RelayError {
    /// Whether this attempt reached the provider and still costs quota.
    pub fn consumes_quota(&self) -> bool {
        matches!(self, Self::NameTaken(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub id: Option<String>,
    pub url: String,
}

// Provider API request format
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDeployment<'a> {
    name: &'a str,
    files: Vec<InlineFile<'a>>,
    project_settings: ProjectSettings,
    target: &'static str,
}

#[derive(Serialize)]
struct InlineFile<'a> {
    file: &'a str,
    data: String,
    encoding: &'static str,
}

// All null: serve files as uploaded, no framework detection or build
#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct ProjectSettings {
    framework: Option<String>,
    build_command: Option<String>,
    output_directory: Option<String>,
    install_command: Option<String>,
}

// Provider API response formats
#[derive(Deserialize, Default)]
struct CreatedDeployment {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize, Default)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct DeployProvider {
    client: reqwest::Client,
    api_url: String,
    domain: String,
    token: Option<String>,
    timeout: Duration,
    classifier: Classifier,
}

impl DeployProvider {
    pub fn new(client: reqwest::Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            domain: config.domain.clone(),
            token: config.token.clone(),
            timeout: config.timeout,
            classifier: Arc::new(classify_by_message),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn has_credential(&self) -> bool {
        self.token.is_some()
    }

    // Conventional url when the provider omits one
    pub fn fallback_url(&self, name: &str) -> String {
        format!("https://{}.{}", name, self.domain)
    }

    pub async fn deploy(&self, name: &str, files: &[FileEntry]) -> Result<Deployment, RelayError> {
        let token = self.token.as_deref().ok_or(RelayError::MissingCredential)?;

        let body = CreateDeployment {
            name,
            files: files
                .iter()
                .map(|f| InlineFile {
                    file: &f.path,
                    data: BASE64.encode(f.content.as_bytes()),
                    encoding: "base64",
                })
                .collect(),
            project_settings: ProjectSettings::default(),
            target: "production",
        };

        let url = format!(
            "{}/v13/deployments?skipAutoDetectionConfirmation=1",
            self.api_url
        );
        debug!(name, files = files.len(), "Creating deployment");

        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        if status.is_success() {
            // the deployment exists once the provider says 2xx, body or not
            let text = res.text().await.unwrap_or_default();
            let created: CreatedDeployment = serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(error = %e, "Unreadable deployment response, using fallback url");
                CreatedDeployment::default()
            });
            let url = match created.url.filter(|u| !u.is_empty()) {
                Some(host) => format!("https://{}", host),
                None => self.fallback_url(name),
            };
            return Ok(Deployment {
                id: created.id,
                url,
            });
        }

        let text = res.text().await.unwrap_or_default();
        let envelope: ErrorEnvelope = serde_json::from_str(&text).unwrap_or_default();
        let rejection = match envelope.error {
            Some(body) => ProviderRejection {
                status: status.as_u16(),
                code: body.code,
                message: body.message,
            },
            None => ProviderRejection {
                status: status.as_u16(),
                code: None,
                message: Some(text).filter(|t| !t.is_empty()),
            },
        };
        warn!(rejection = %rejection, "Provider rejected deployment");

        match (self.classifier)(&rejection) {
            FailureClass::NameTaken => Err(RelayError::NameTaken(rejection)),
            FailureClass::Other => Err(RelayError::Rejected(rejection)),
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            RelayError::Timeout(self.timeout)
        } else {
            RelayError::Transport(e)
        }
    }
}
