// ABOUTME: Upstream session client contract for the IntelligenceBank identity provider
// ABOUTME: Defines the provider trait, session payload types, and the polling outcome enum
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

/// Reqwest implementation of the IB proprietary handshake
pub mod ib;

pub use ib::IbClient;

use crate::errors::AuthError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of starting a browser login against a tenant platform.
///
/// The `login_token` is the opaque value IB hands back before any user has
/// authenticated; it doubles as the lookup handle for session-completion
/// checks. `session_hours` is the platform-declared session lifetime
/// (`logintimeoutperiod`), absent on some tenants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatedLogin {
    /// Upstream session identifier assigned at initiation
    pub sid: String,
    /// Opaque initiation token, used for login URL and completion checks
    pub login_token: String,
    /// Platform-declared session lifetime in hours, if any
    pub session_hours: Option<i64>,
}

/// A fully validated upstream session, produced once the user completes login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSession {
    /// Upstream session identifier (`sid`), orthogonal to our issued tokens
    pub sid: String,
    /// Raw session-info payload as returned by the platform; carried opaquely
    /// so userinfo consumers can map claims without re-fetching
    pub info: serde_json::Value,
    /// Platform-declared session lifetime in hours, if any
    pub session_hours: Option<i64>,
}

impl UpstreamSession {
    /// Tenant API base URL advertised inside the session payload, if present
    #[must_use]
    pub fn api_url(&self) -> Option<&str> {
        self.info.pointer("/info/apiV3url").and_then(|v| v.as_str())
    }
}

/// The upstream credential carried inside a pending-authorization record.
///
/// A record starts out `Initiated` and is rewritten to `Session` when the
/// poll step observes login completion — the promotion from poll-token key
/// to authorization-code key replaces this field and nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum UpstreamToken {
    /// Login started, user has not authenticated yet
    Initiated(InitiatedLogin),
    /// Login complete, full session info attached
    Session(UpstreamSession),
}

/// Outcome of a session-completion check.
///
/// `Pending` is a distinguishable non-error outcome: the flow controller maps
/// it to its polling-continuation response rather than aborting.
#[derive(Debug, Clone)]
pub enum SessionPoll {
    /// The user has not finished logging in
    Pending,
    /// Login finished; the validated session is attached
    Complete(UpstreamSession),
}

/// Client for the provider's proprietary token/session handshake.
///
/// Implementations know nothing about OAuth semantics. Hard failures must
/// surface as `AuthError::ServerError`, never be silently swallowed; there
/// are no internal retries.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Request an initiation token scoped to the given tenant platform
    async fn initiate(&self, platform_url: &str) -> Result<InitiatedLogin, AuthError>;

    /// Check whether the login started by `login` has completed
    async fn check_session(
        &self,
        platform_url: &str,
        login: &InitiatedLogin,
    ) -> Result<SessionPoll, AuthError>;

    /// Browser URL where the user completes the tenant login
    fn login_url(&self, platform_url: &str, login: &InitiatedLogin) -> String;
}
