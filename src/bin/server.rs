//! Chat server entry point: wire configuration, adapter, policy client, and
//! the HTTP surface together.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use policy_chat::policy::{PolicyClient, PolicyToolExecutor};
use policy_chat::server::{router, AppState};
use policy_chat::{create_adapter, default_catalog, AppConfig, ToolLoop};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;
    let adapter = create_adapter(&config).context("constructing provider adapter")?;
    info!(provider = %config.provider, "model provider configured");

    let policy_client =
        PolicyClient::new(config.policy.clone()).context("constructing policy client")?;
    let executor = Arc::new(PolicyToolExecutor::new(policy_client));

    let catalog = Arc::new(default_catalog());
    info!(tools = catalog.len(), "tool catalog ready");

    let state = AppState {
        driver: Arc::new(ToolLoop::new(adapter, config.max_tool_rounds)),
        executor,
        catalog,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "chat server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
