// ABOUTME: Record types held by the record store plus OAuth request/response structures
// ABOUTME: PendingAuthorization and IssuedToken carry the bridge's only persistent state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

use crate::upstream::{UpstreamSession, UpstreamToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A short-lived authorization attempt, keyed first by poll-token and — after
/// login completes — by the authorization code.
///
/// Promotion from poll-token to code is an explicit re-key (new record under
/// the code key, poll record deleted) performed by the record store; every
/// OAuth echo field including the PKCE pair and `original_state` survives it
/// unchanged. Single use: deleted as soon as the code is exchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAuthorization {
    /// Lookup key: a poll-token, or the authorization code after promotion
    pub key: String,
    /// Requesting OAuth client; must match exactly at code-exchange time
    pub client_id: String,
    /// Callback the client registered for this attempt; exact-match at exchange
    pub redirect_uri: String,
    /// Granted scope, echoed into the issued token
    pub scope: String,
    /// Upstream credential: initiation token first, full session after login
    pub upstream: UpstreamToken,
    /// Tenant platform endpoint (IB is multi-tenant, no central discovery)
    pub platform_url: String,
    /// The client's original `state` parameter, preserved across promotion so
    /// its CSRF check round-trips
    pub original_state: Option<String>,
    /// PKCE challenge (public clients only)
    pub code_challenge: Option<String>,
    /// PKCE challenge method; always `S256` when present
    pub code_challenge_method: Option<String>,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Absolute expiry; enforced lazily on read
    pub expires_at: DateTime<Utc>,
}

/// An issued access/refresh token pair bound to a validated upstream session.
///
/// `refresh_count` and `session_created_at` carry forward unmodified through
/// every refresh — only the token pair and `expires_at` rotate. Superseded
/// (old record deleted, new one written) on each refresh; lazily deleted on
/// expiry at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Opaque bearer access token (primary key)
    pub access_token: String,
    /// Opaque refresh token, paired 1:1 at issuance (secondary index)
    pub refresh_token: String,
    /// Owning OAuth client
    pub client_id: String,
    /// Granted scope
    pub scope: String,
    /// Validated upstream session, carried unchanged across refreshes
    pub session: UpstreamSession,
    /// Tenant platform endpoint
    pub platform_url: String,
    /// Issuance instant of this token pair
    pub created_at: DateTime<Utc>,
    /// Access-token expiry (1 hour), independent of the session clock
    pub expires_at: DateTime<Utc>,
    /// When the upstream session itself lapses and re-validation is required
    pub session_expires_at: DateTime<Utc>,
    /// First issuance of the underlying upstream session; anchors the
    /// absolute session-age ceiling
    pub session_created_at: DateTime<Utc>,
    /// Refresh rotations performed so far, bounded by the configured maximum
    pub refresh_count: u32,
}

/// Start-login parameters collected from the authorization request
#[derive(Debug, Clone, Deserialize)]
pub struct StartLoginRequest {
    /// Tenant platform URL entered by the user
    pub platform_url: String,
    /// OAuth response type; must be `code`
    pub response_type: Option<String>,
    /// OAuth client identifier
    pub client_id: String,
    /// OAuth redirect URI
    pub redirect_uri: String,
    /// Requested scope; defaults to `profile` when omitted
    pub scope: Option<String>,
    /// Client CSRF state, preserved verbatim through the flow
    pub state: Option<String>,
    /// PKCE challenge (mandatory for public clients)
    pub code_challenge: Option<String>,
    /// PKCE challenge method (must be `S256` when a challenge is present)
    pub code_challenge_method: Option<String>,
}

/// Successful start-login response: where to send the browser, and the
/// poll-token the client uses to watch for completion
#[derive(Debug, Serialize, Deserialize)]
pub struct StartLoginResponse {
    /// Tenant login page to open for the user
    #[serde(rename = "loginUrl")]
    pub login_url: String,
    /// Opaque poll-token for the completion-polling loop
    pub token: String,
}

/// Successful poll response: the client callback carrying code and state
#[derive(Debug, Serialize, Deserialize)]
pub struct PollResponse {
    /// Redirect target with `code` and the original `state` attached
    pub redirect_url: String,
}

/// OAuth 2.0 token request (form-encoded, RFC 6749 §4.1.3 / §6)
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// `authorization_code` or `refresh_token`
    pub grant_type: String,
    /// Authorization code (authorization_code grant)
    pub code: Option<String>,
    /// Redirect URI; must match the one stored with the code
    pub redirect_uri: Option<String>,
    /// Client identifier
    pub client_id: String,
    /// Refresh token (refresh_token grant)
    pub refresh_token: Option<String>,
    /// PKCE code verifier (authorization_code grant, public clients)
    pub code_verifier: Option<String>,
}

/// OAuth 2.0 token response (RFC 6749 §5.1), extended with the tenant API
/// endpoint and upstream session id the original bridge exposes to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Opaque bearer access token
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
    /// Rotating refresh token
    pub refresh_token: String,
    /// Granted scope
    pub scope: String,
    /// Tenant API endpoint for direct upstream calls
    pub platform_url: String,
    /// Upstream session identifier
    pub sid: String,
}
