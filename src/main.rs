use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use site_deploy_relay::config::Args;
use site_deploy_relay::metrics::LEDGER_SIZE;
use site_deploy_relay::router;
use site_deploy_relay::state::AppState;

// Ledger sweep - lookups sweep too, this bounds growth between requests
async fn ledger_sweeper(state: Arc<AppState>, every: Duration) {
    let mut interval = interval(every);
    loop {
        interval.tick().await;
        let removed = state.ledger.sweep();
        LEDGER_SIZE.set(state.ledger.len() as f64);
        if removed > 0 {
            info!(removed, "Swept idle quota records");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();
    let state = AppState::from_args(&args);

    if !state.provider.has_credential() {
        warn!("VERCEL_TOKEN is not set; deploys will fail until it is configured");
    }

    tokio::spawn(ledger_sweeper(
        state.clone(),
        Duration::from_secs(args.sweep_interval.max(1)),
    ));

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(port = args.port, "Deploy relay running on http://localhost:{}", args.port);
    info!(provider = %args.provider_url, "Forwarding deployments");
    info!(
        daily_quota = args.daily_quota,
        cooldown_secs = args.cooldown,
        "Quota policy"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
