use std::sync::Arc;

use crate::config::Args;
use crate::provider::DeployProvider;
use crate::quota::QuotaLedger;
use crate::sanitizer::{FilePolicy, Sanitizer};
// app's shared state

pub struct AppState {
    pub ledger: QuotaLedger,
    pub sanitizer: Sanitizer,
    pub provider: DeployProvider,
    pub max_body_bytes: usize, // request body ceiling
}

impl AppState {
    pub fn from_args(args: &Args) -> Arc<Self> {
        Arc::new(Self {
            ledger: QuotaLedger::new(&args.quota()),
            sanitizer: Sanitizer::new(FilePolicy::default(), args.max_extracted_bytes),
            provider: DeployProvider::new(reqwest::Client::new(), &args.provider()),
            max_body_bytes: args.max_body_bytes,
        })
    }
}
