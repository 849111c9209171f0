//! Bandwidth-hero compression proxy (v1)
//!
//! ```text
//! Client ── GET /?url=… ──▶ http server ──▶ orchestrator ──▶ fetch (reqwest) ──▶ Origin
//!                                               │
//!                                               ├─ compression policy
//!                                               └─ fallback chain (image / zune-jpeg)
//! Client ◀── image bytes + x-bytes-saved ───────┘
//! ```

use std::path::PathBuf;

use bandwidth_hero_proxy::config::{load_config, ProxyConfig};
use bandwidth_hero_proxy::{lifecycle, observability};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bandwidth-hero-proxy")]
#[command(about = "Image compression proxy", long_about = None)]
struct Args {
    /// TOML config file; defaults apply without it.
    #[arg(short, long, env = "BHP_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    observability::logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "bandwidth-hero-proxy starting"
    );

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
