// ABOUTME: Reqwest client for the IntelligenceBank proprietary auth endpoints
// ABOUTME: Implements initiation-token issuance and 404-as-pending session polling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

use super::{InitiatedLogin, SessionPoll, SessionProvider, UpstreamSession};
use crate::constants::upstream;
use crate::errors::AuthError;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Response from the initial token request (`POST /v1/auth/app/token`)
#[derive(Debug, Deserialize)]
struct InitialTokenResponse {
    sid: String,
    /// Opaque initiation token
    content: String,
    /// Session lifetime in hours declared by the platform
    logintimeoutperiod: Option<i64>,
}

/// HTTP client for the IB identity platform.
///
/// Multi-tenant: every call takes the tenant `platform_url` because IB has no
/// central discovery endpoint. Requests carry bounded timeouts but are never
/// retried here — transient-failure policy belongs to the caller.
pub struct IbClient {
    http: Client,
}

impl IbClient {
    /// Create a client with pooled connections and bounded timeouts
    #[must_use]
    pub fn new() -> Self {
        let http = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http }
    }

    fn base(platform_url: &str) -> &str {
        platform_url.trim_end_matches('/')
    }
}

impl Default for IbClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for IbClient {
    async fn initiate(&self, platform_url: &str) -> Result<InitiatedLogin, AuthError> {
        let url = format!("{}{}", Self::base(platform_url), upstream::INITIAL_TOKEN_PATH);

        let response = self.http.post(&url).send().await.map_err(|e| {
            tracing::error!("IB initial token request failed for {url}: {e}");
            AuthError::ServerError("Failed to get initial token from IntelligenceBank".into())
        })?;

        if !response.status().is_success() {
            tracing::error!(
                "IB initial token request returned {} for {url}",
                response.status()
            );
            return Err(AuthError::ServerError(
                "Failed to get initial token from IntelligenceBank".into(),
            ));
        }

        let body: InitialTokenResponse = response.json().await.map_err(|e| {
            tracing::error!("IB initial token response was malformed: {e}");
            AuthError::ServerError("Failed to get initial token from IntelligenceBank".into())
        })?;

        tracing::debug!(sid = %body.sid, "obtained IB initiation token");

        Ok(InitiatedLogin {
            sid: body.sid,
            login_token: body.content,
            session_hours: body.logintimeoutperiod,
        })
    }

    async fn check_session(
        &self,
        platform_url: &str,
        login: &InitiatedLogin,
    ) -> Result<SessionPoll, AuthError> {
        let url = format!("{}{}", Self::base(platform_url), upstream::SESSION_INFO_PATH);

        let response = self
            .http
            .get(&url)
            .query(&[("token", login.login_token.as_str())])
            .header("sid", &login.sid)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("IB session info request failed for {url}: {e}");
                AuthError::ServerError(
                    "Failed to get session information from IntelligenceBank".into(),
                )
            })?;

        // 404 is the platform's "login not finished yet" signal
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(SessionPoll::Pending);
        }

        if !response.status().is_success() {
            tracing::error!(
                "IB session info request returned {} for {url}",
                response.status()
            );
            return Err(AuthError::ServerError(
                "Failed to get session information from IntelligenceBank".into(),
            ));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            tracing::error!("IB session info response was malformed: {e}");
            AuthError::ServerError("Failed to get session information from IntelligenceBank".into())
        })?;

        let sid = body
            .pointer("/content/session/sid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                tracing::error!("IB session info response is missing content.session.sid");
                AuthError::ServerError(
                    "Failed to get session information from IntelligenceBank".into(),
                )
            })?
            .to_owned();

        let info = body.get("content").cloned().unwrap_or(serde_json::Value::Null);

        Ok(SessionPoll::Complete(UpstreamSession {
            sid,
            info,
            // Completion responses do not re-declare the lifetime; carry the
            // value observed at initiation
            session_hours: login.session_hours,
        }))
    }

    fn login_url(&self, platform_url: &str, login: &InitiatedLogin) -> String {
        format!(
            "{}{}?login=0&token={}",
            Self::base(platform_url),
            upstream::LOGIN_PATH,
            login.login_token
        )
    }
}
