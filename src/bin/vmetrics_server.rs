//! vmetrics-server: RedTrack 指标服务入口
//!
//! Usage:
//!   vmetrics-server                  Serve with defaults and environment overrides
//!   VMETRICS_CONFIG=conf.yaml vmetrics-server
//!
//! Logging follows `RUST_LOG` (default `vmetrics=info,tower_http=info`).

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use vmetrics::config::Config;

const DEFAULT_LOG_FILTER: &str = "vmetrics=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt().with_env_filter(filter).init();

    let config = Config::load().context("failed to load configuration")?;
    info!(version = env!("CARGO_PKG_VERSION"), bind = %config.bind_address(), "Starting vmetrics");

    vmetrics::api::serve(config).await.context("server failed")?;
    Ok(())
}
