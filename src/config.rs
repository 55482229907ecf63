use clap::Parser;
use std::time::Duration;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "site-deploy-relay")]
#[command(about = "Upload-and-deploy relay for static sites")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Deployment provider API base url
    #[arg(long, env = "PROVIDER_API_URL", default_value = "https://api.vercel.com")]
    pub provider_url: String,

    // Domain used when the provider does not return a url
    #[arg(long, env = "PROVIDER_DOMAIN", default_value = "vercel.app")]
    pub provider_domain: String,

    // Provider access token, checked per request
    #[arg(long, env = "VERCEL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    // Deploys allowed per client per calendar day
    #[arg(long, default_value_t = 50)]
    pub daily_quota: u32,

    // Wait after a deploy attempt in seconds
    #[arg(long, default_value_t = 300)]
    pub cooldown: u64,

    // Idle hours before a client record is evicted
    #[arg(long, default_value_t = 24)]
    pub retention_hours: u64,

    // Provider call ceiling in seconds
    #[arg(long, default_value_t = 30)]
    pub deploy_timeout: u64,

    // Background ledger sweep interval in seconds
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    // Max request body in bytes (base64 inflates uploads by a third)
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    pub max_body_bytes: usize,

    // Max total bytes extracted from one archive
    #[arg(long, default_value_t = 50 * 1024 * 1024)]
    pub max_extracted_bytes: u64,
}

/// Quota ledger settings derived from [`Args`].
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub daily_cap: u32,
    pub cooldown: Duration,
    pub retention: Duration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_cap: 50,
            cooldown: Duration::from_secs(5 * 60),
            retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Deployment provider settings derived from [`Args`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_url: String,
    pub domain: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Args {
    pub fn quota(&self) -> QuotaConfig {
        QuotaConfig {
            daily_cap: self.daily_quota,
            cooldown: Duration::from_secs(self.cooldown),
            retention: Duration::from_secs(self.retention_hours * 60 * 60),
        }
    }

    pub fn provider(&self) -> ProviderConfig {
        ProviderConfig {
            api_url: self.provider_url.trim_end_matches('/').to_string(),
            domain: self.provider_domain.clone(),
            // an empty VERCEL_TOKEN counts as missing
            token: self.token.clone().filter(|t| !t.trim().is_empty()),
            timeout: Duration::from_secs(self.deploy_timeout),
        }
    }
}
