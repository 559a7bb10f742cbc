//! Henry HQ Dashboard - HTTP API server for the dashboard UI.

use clap::Parser;
use henry_hq::config::Config;
use henry_hq::gateway::redact_token;
use henry_hq::server::{build_router, AppState};
use std::net::SocketAddr;
use tracing::{info, warn};

// ---- CLI ----

#[derive(Parser)]
#[command(name = "henry-hq-dashboard", about = "Henry HQ Dashboard API")]
struct Args {
    /// Bind address (overrides config)
    #[arg(long)]
    bind: Option<String>,

    /// Port (overrides config)
    #[arg(long, short)]
    port: Option<u16>,
}

// ---- Main ----

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    // Load config
    let config = Config::from_env()?;

    let bind = args.bind.unwrap_or_else(|| config.dashboard.bind.clone());
    let port = args.port.unwrap_or(config.dashboard.port);

    info!(gateway = %redact_token(&config.gateway.url), "Henry HQ dashboard starting");
    if !config.gateway.has_token() {
        warn!("no gateway token configured; authenticated calls will be rejected");
    }

    // Build router
    let state = AppState::new(config);
    let app = build_router(state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Dashboard listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
