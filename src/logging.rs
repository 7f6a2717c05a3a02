// ABOUTME: Tracing subscriber setup for structured logging with noise reduction
// ABOUTME: Honors RUST_LOG while keeping HTTP-stack dependencies at warn level
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

use anyhow::Result;
use std::env;
use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format options
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON format for production logging
    Json,
    /// Pretty format for development
    #[default]
    Pretty,
}

impl LogFormat {
    fn from_env() -> Self {
        match env::var("BRIDGE_LOG_FORMAT").as_deref() {
            Ok("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` overrides the base level; the dependency noise-reduction
/// directives apply either way.
///
/// # Errors
///
/// Returns an error if a subscriber is already installed.
pub fn init() -> Result<()> {
    let base = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned());

    let env_filter = EnvFilter::new(&base)
        .add_directive(
            "hyper=warn"
                .parse()
                .unwrap_or_else(|_| tracing::Level::WARN.into()),
        )
        .add_directive(
            "reqwest=warn"
                .parse()
                .unwrap_or_else(|_| tracing::Level::WARN.into()),
        )
        .add_directive(
            "tower_http=info"
                .parse()
                .unwrap_or_else(|_| tracing::Level::INFO.into()),
        );

    let registry = tracing_subscriber::registry().with(env_filter);

    match LogFormat::from_env() {
        LogFormat::Json => {
            let layer = fmt::layer()
                .with_target(true)
                .with_writer(io::stdout)
                .json();
            registry.with(layer).try_init()?;
        }
        LogFormat::Pretty => {
            let layer = fmt::layer().with_target(true).with_writer(io::stdout);
            registry.with(layer).try_init()?;
        }
    }

    Ok(())
}
