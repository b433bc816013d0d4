//! Authoritative game server for real-time 1v1 tank duels

mod app;
mod auth;
mod config;
mod game;
mod http;
mod store;
mod util;
mod ws;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::AppState;
use crate::config::Config;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    init_server_time();

    let addr = config.server_addr;
    let state = AppState::new(config);
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "server listening");

    axum::serve(listener, router)
        .await
        .context("server terminated unexpectedly")?;
    Ok(())
}
