// ABOUTME: Server binary wiring the record store, flow controller, and HTTP routes
// ABOUTME: Loads configuration from the environment and serves the axum router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

//! # IntelligenceBank OAuth Bridge Server
//!
//! Starts the OAuth 2.0 authorization server that bridges MCP and other
//! OAuth clients onto IntelligenceBank's asynchronous login flow.

use anyhow::{Context, Result};
use clap::Parser;
use ib_oauth_bridge::{
    config::{ClientRegistry, ServerConfig},
    flow::AuthorizationFlow,
    logging,
    routes::{AppState, BridgeRoutes},
    store::MemoryRecordStore,
    token::TokenManager,
    upstream::IbClient,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "ib-oauth-bridge")]
#[command(about = "OAuth 2.0 authorization server bridging IntelligenceBank logins")]
pub struct Args {
    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }

    logging::init()?;

    info!("Starting IntelligenceBank OAuth bridge");
    info!(
        port = config.port,
        issuer = %config.issuer_url,
        "configuration loaded"
    );

    let store = Arc::new(MemoryRecordStore::new());
    let upstream = Arc::new(IbClient::new());
    let registry =
        Arc::new(ClientRegistry::well_known().context("Failed to build client registry")?);

    let state = Arc::new(AppState {
        flow: AuthorizationFlow::new(store.clone(), upstream, registry),
        tokens: TokenManager::new(store, config.clone()),
        config: config.clone(),
    });

    let router = BridgeRoutes::routes(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;

    info!("Listening on 0.0.0.0:{}", config.port);

    axum::serve(listener, router)
        .await
        .context("HTTP server terminated")?;

    Ok(())
}
