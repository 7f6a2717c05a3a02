// ABOUTME: Unified error taxonomy for the OAuth bridge with RFC 6749 wire mapping
// ABOUTME: Defines AuthError for flow/token failures and StoreError for record storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the authorization flow and token lifecycle.
///
/// Each variant maps to an OAuth 2.0 error code and an HTTP status. The
/// `authorization_pending` variant is a legitimate polling state, not a
/// failure: clients observing it must retry, not abort.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing request parameters
    #[error("{0}")]
    InvalidRequest(String),

    /// Unknown client_id or disallowed redirect pattern
    #[error("{0}")]
    UnauthorizedClient(String),

    /// Expired/missing/mismatched code or refresh token, or PKCE failure
    #[error("{0}")]
    InvalidGrant(String),

    /// Grant type not supported by this server
    #[error("Grant type not supported")]
    UnsupportedGrantType,

    /// Upstream login has not completed yet (polling continuation)
    #[error("The authorization request is still pending")]
    AuthorizationPending,

    /// Polling window exhausted before upstream login completed
    #[error("The authorization request has timed out")]
    AuthorizationTimeout,

    /// Refresh-token reuse exceeded the bounded attempt count
    #[error("Session refresh limit exceeded")]
    RefreshLimitExceeded,

    /// Absolute upstream session age ceiling reached
    #[error("Session has expired")]
    SessionExpired,

    /// Upstream or internal failure; detail is logged, never sent to clients
    #[error("{0}")]
    ServerError(String),
}

impl AuthError {
    /// OAuth 2.0 error code for the wire body (RFC 6749 §5.2 / §4.1.2.1)
    #[must_use]
    pub const fn oauth_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::InvalidGrant(_) | Self::RefreshLimitExceeded | Self::SessionExpired => {
                "invalid_grant"
            }
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::AuthorizationPending => "authorization_pending",
            Self::AuthorizationTimeout => "authorization_timeout",
            Self::ServerError(_) => "server_error",
        }
    }

    /// HTTP status for the default JSON rendering.
    ///
    /// `authorization_pending`/`authorization_timeout` map to 404: the
    /// 404-as-pending convention drives the client-side polling loop and must
    /// be preserved exactly.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::UnauthorizedClient(_)
            | Self::InvalidGrant(_)
            | Self::UnsupportedGrantType
            | Self::RefreshLimitExceeded
            | Self::SessionExpired => StatusCode::BAD_REQUEST,
            Self::AuthorizationPending | Self::AuthorizationTimeout => StatusCode::NOT_FOUND,
            Self::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the RFC 6749 error body, optionally echoing the client state
    #[must_use]
    pub fn to_body(&self, state: Option<&str>) -> OAuthErrorBody {
        OAuthErrorBody {
            error: self.oauth_code().to_owned(),
            error_description: Some(self.to_string()),
            state: state.map(ToOwned::to_owned),
        }
    }

    /// Build an error-redirect location for a validated `redirect_uri`
    /// (RFC 6749 §4.1.2.1 style: `error`, `error_description`, `state`).
    #[must_use]
    pub fn redirect_location(&self, redirect_uri: &str, state: Option<&str>) -> String {
        let mut params = vec![
            ("error", self.oauth_code().to_owned()),
            ("error_description", self.to_string()),
        ];
        if let Some(s) = state {
            params.push(("state", s.to_owned()));
        }
        match url::Url::parse_with_params(redirect_uri, &params) {
            Ok(url) => url.into(),
            // redirect_uri was regex-validated against the registry before we
            // got here; an unparsable URI still gets a best-effort redirect
            Err(_) => format!("{redirect_uri}?error={}", self.oauth_code()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = self.to_body(None);
        (status, Json(body)).into_response()
    }
}

/// OAuth 2.0 error response body (RFC 6749 §5.2)
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthErrorBody {
    /// Error code
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// State parameter echoed for redirect-delivered errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Record store lookup failures.
///
/// `Expired` is reported only after the store has deleted the stale record,
/// so a retry can never observe a resurrected entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No record under the requested key
    #[error("record not found")]
    NotFound,
    /// Record was past its `expires_at` and has been deleted
    #[error("record has expired")]
    Expired,
}
