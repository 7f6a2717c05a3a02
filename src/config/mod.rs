// ABOUTME: Environment-based runtime configuration for the OAuth bridge
// ABOUTME: Parses listen address, issuer URL, and session policy from environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

pub mod clients;

pub use clients::{ClientRegistry, ClientType, WellKnownClient};

use crate::constants::session;
use anyhow::{Context, Result};
use std::env;
use tracing::warn;

/// Runtime configuration, sourced from environment variables with
/// development-friendly defaults
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port the HTTP server binds
    pub port: u16,
    /// Public base URL advertised as the OAuth issuer (RFC 8414 metadata)
    pub issuer_url: String,
    /// Session lifetime assumed when the platform declares none
    pub default_session_hours: i64,
    /// Refresh rotations allowed before re-authentication is forced
    pub max_refresh_count: u32,
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse; unset variables
    /// fall back to defaults.
    pub fn from_env() -> Result<Self> {
        let port = parse_or_default("BRIDGE_PORT", 8080)?;

        let issuer_url = env::var("BRIDGE_ISSUER_URL").unwrap_or_else(|_| {
            let fallback = format!("http://localhost:{port}");
            warn!("BRIDGE_ISSUER_URL not set, using {fallback}");
            fallback
        });

        Ok(Self {
            port,
            issuer_url: issuer_url.trim_end_matches('/').to_owned(),
            default_session_hours: parse_or_default(
                "BRIDGE_SESSION_HOURS",
                session::DEFAULT_SESSION_HOURS,
            )?,
            max_refresh_count: parse_or_default(
                "BRIDGE_MAX_REFRESH_COUNT",
                session::DEFAULT_MAX_REFRESH_COUNT,
            )?,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            issuer_url: "http://localhost:8080".to_owned(),
            default_session_hours: session::DEFAULT_SESSION_HOURS,
            max_refresh_count: session::DEFAULT_MAX_REFRESH_COUNT,
        }
    }
}

fn parse_or_default<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Invalid {name}: {value}")),
        Err(_) => Ok(default),
    }
}
