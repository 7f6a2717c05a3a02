// ABOUTME: Token lifecycle manager covering code exchange, refresh rotation, and bearer auth
// ABOUTME: Enforces PKCE, single-use codes, refresh limits, and the session-age ceiling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

use crate::config::ServerConfig;
use crate::constants::{entropy, session, ttl};
use crate::errors::{AuthError, StoreError};
use crate::models::{IssuedToken, TokenRequest, TokenResponse};
use crate::pkce;
use crate::store::RecordStore;
use crate::upstream::UpstreamToken;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Mints, rotates, and authenticates the bridge's opaque token pairs.
///
/// The session bookkeeping fields (`session_created_at`, `session_expires_at`)
/// are fixed at code exchange and never move on refresh, so the session-age
/// ceiling is absolute no matter how diligently a client rotates.
pub struct TokenManager {
    store: Arc<dyn RecordStore>,
    config: ServerConfig,
}

impl TokenManager {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, config: ServerConfig) -> Self {
        Self { store, config }
    }

    /// Dispatch a token request by grant type.
    ///
    /// # Errors
    ///
    /// `UnsupportedGrantType` for anything other than `authorization_code`
    /// and `refresh_token`; otherwise whatever the grant handler raises.
    pub async fn handle(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError> {
        match request.grant_type.as_str() {
            "authorization_code" => self.exchange_code(request).await,
            "refresh_token" => self.refresh(request).await,
            other => {
                error!(grant_type = %other, "token request rejected: unsupported grant type");
                Err(AuthError::UnsupportedGrantType)
            }
        }
    }

    /// Exchange a single-use authorization code for a token pair.
    ///
    /// # Errors
    ///
    /// `InvalidGrant` for unknown, expired, or mismatched codes and PKCE
    /// failures; `AuthorizationPending` if the code value is actually a
    /// poll-token whose login has not completed.
    pub async fn exchange_code(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError> {
        let code = request.code.as_deref().ok_or_else(|| {
            AuthError::InvalidRequest("code is required for the authorization_code grant".into())
        })?;

        let record = match self.store.get_pending(code).await {
            Ok(record) => record,
            Err(StoreError::Expired) => {
                error!("code exchange rejected: authorization code expired");
                return Err(AuthError::InvalidGrant(
                    "Authorization code has expired".into(),
                ));
            }
            Err(StoreError::NotFound) => {
                error!("code exchange rejected: unknown authorization code");
                return Err(AuthError::InvalidGrant("Invalid authorization code".into()));
            }
        };

        let session = match &record.upstream {
            UpstreamToken::Session(session) => session.clone(),
            UpstreamToken::Initiated(_) => {
                // The client skipped the poll step and presented its
                // poll-token as a code; the login is simply not finished
                info!("code exchange deferred: upstream login still pending");
                return Err(AuthError::AuthorizationPending);
            }
        };

        if record.client_id != request.client_id {
            error!(
                expected = %record.client_id,
                got = %request.client_id,
                "code exchange rejected: client mismatch"
            );
            return Err(AuthError::InvalidGrant(
                "Authorization code was issued to another client".into(),
            ));
        }

        match request.redirect_uri.as_deref() {
            Some(uri) if uri == record.redirect_uri => {}
            _ => {
                error!("code exchange rejected: redirect_uri mismatch");
                return Err(AuthError::InvalidGrant(
                    "redirect_uri does not match the authorization request".into(),
                ));
            }
        }

        if let Some(challenge) = &record.code_challenge {
            let verifier = request.code_verifier.as_deref().ok_or_else(|| {
                error!("code exchange rejected: code_verifier missing");
                AuthError::InvalidGrant("code_verifier is required".into())
            })?;
            pkce::verify_s256(verifier, challenge)?;
        }

        let now = Utc::now();
        let session_hours = session
            .session_hours
            .unwrap_or(self.config.default_session_hours);

        let token = IssuedToken {
            access_token: pkce::generate_urlsafe_secret(entropy::OPAQUE_TOKEN_BYTES)?,
            refresh_token: pkce::generate_urlsafe_secret(entropy::OPAQUE_TOKEN_BYTES)?,
            client_id: record.client_id,
            scope: record.scope,
            platform_url: session
                .api_url()
                .map_or_else(|| record.platform_url.clone(), ToOwned::to_owned),
            session,
            created_at: now,
            expires_at: now + Duration::seconds(ttl::ACCESS_TOKEN_SECS),
            session_expires_at: now + Duration::hours(session_hours),
            session_created_at: now,
            refresh_count: 0,
        };

        // Persist the pair before consuming the code: a crash in between
        // leaves a retryable code, never a lost login
        self.store.put_token(token.clone()).await.map_err(|e| {
            error!("failed to persist issued token: {e}");
            AuthError::ServerError("Failed to persist issued token".into())
        })?;

        // Single use: exactly one of two racing exchanges removes the code;
        // the loser retracts its freshly minted pair
        if self.store.consume_pending(code).await.is_err() {
            error!("code exchange rejected: code already consumed");
            self.store.delete_token(&token.access_token).await.ok();
            return Err(AuthError::InvalidGrant("Invalid authorization code".into()));
        }

        info!("authorization code exchanged, token pair issued");

        Ok(Self::to_response(&token))
    }

    /// Rotate a token pair for a valid refresh token.
    ///
    /// # Errors
    ///
    /// `InvalidGrant` for unknown tokens or client mismatch; the refresh
    /// limit and session ceiling also render as `invalid_grant` on the wire
    /// so compliant clients restart the authorization flow.
    pub async fn refresh(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError> {
        let refresh_token = request.refresh_token.as_deref().ok_or_else(|| {
            AuthError::InvalidRequest(
                "refresh_token is required for the refresh_token grant".into(),
            )
        })?;

        let record = match self.store.get_token_by_refresh_token(refresh_token).await {
            Ok(record) => record,
            Err(StoreError::Expired) => {
                error!("refresh rejected: refresh token expired");
                return Err(AuthError::InvalidGrant("Refresh token has expired".into()));
            }
            Err(StoreError::NotFound) => {
                error!("refresh rejected: unknown refresh token");
                return Err(AuthError::InvalidGrant("Invalid refresh token".into()));
            }
        };

        if record.client_id != request.client_id {
            error!(
                expected = %record.client_id,
                got = %request.client_id,
                "refresh rejected: client mismatch"
            );
            return Err(AuthError::InvalidGrant(
                "Refresh token was issued to another client".into(),
            ));
        }

        self.validate_refresh_attempt(&record)?;

        let now = Utc::now();
        let rotated = IssuedToken {
            access_token: pkce::generate_urlsafe_secret(entropy::OPAQUE_TOKEN_BYTES)?,
            refresh_token: pkce::generate_urlsafe_secret(entropy::OPAQUE_TOKEN_BYTES)?,
            created_at: now,
            expires_at: now + Duration::seconds(ttl::ACCESS_TOKEN_SECS),
            refresh_count: record.refresh_count + 1,
            ..record.clone()
        };

        // Write the successor before retiring the old pair
        self.store.put_token(rotated.clone()).await.map_err(|e| {
            error!("failed to persist rotated token: {e}");
            AuthError::ServerError("Failed to persist rotated token".into())
        })?;
        self.store
            .delete_token(&record.access_token)
            .await
            .map_err(|e| {
                error!("failed to retire superseded token: {e}");
                AuthError::ServerError("Failed to retire superseded token".into())
            })?;

        info!(refresh_count = rotated.refresh_count, "token pair rotated");

        Ok(Self::to_response(&rotated))
    }

    /// Authenticate a bearer access token.
    ///
    /// When the upstream session is inside the refresh lookahead window, the
    /// refresh-bounding checks run too: a token whose needed refresh is no
    /// longer permitted must not keep authenticating until the session
    /// actually lapses.
    ///
    /// # Errors
    ///
    /// `InvalidGrant` for unknown or expired tokens, `RefreshLimitExceeded`
    /// or `SessionExpired` when a needed refresh is no longer allowed;
    /// callers decide the HTTP rendering (userinfo answers 401).
    pub async fn authenticate(&self, access_token: &str) -> Result<IssuedToken, AuthError> {
        let record = self.store.get_token(access_token).await.map_err(|e| {
            error!("bearer authentication failed: {e}");
            AuthError::InvalidGrant("Invalid or expired access token".into())
        })?;

        if Self::needs_session_refresh(&record) {
            warn!(sid = %record.session.sid, "upstream session nearing expiry, refresh advised");
            self.validate_refresh_attempt(&record)?;
        }

        Ok(record)
    }

    /// Enforce the bounded refresh count and the absolute session-age ceiling
    fn validate_refresh_attempt(&self, record: &IssuedToken) -> Result<(), AuthError> {
        if record.refresh_count >= self.config.max_refresh_count {
            error!(
                refresh_count = record.refresh_count,
                "refresh rejected: rotation limit reached"
            );
            return Err(AuthError::RefreshLimitExceeded);
        }

        if record.session_expires_at <= Utc::now() {
            error!(sid = %record.session.sid, "refresh rejected: upstream session expired");
            return Err(AuthError::SessionExpired);
        }

        Ok(())
    }

    /// True when the upstream session lapses within the advisory lookahead
    #[must_use]
    pub fn needs_session_refresh(record: &IssuedToken) -> bool {
        record.session_expires_at - Utc::now()
            <= Duration::seconds(session::REFRESH_LOOKAHEAD_SECS)
    }

    fn to_response(token: &IssuedToken) -> TokenResponse {
        TokenResponse {
            access_token: token.access_token.clone(),
            token_type: "Bearer".to_owned(),
            expires_in: ttl::ACCESS_TOKEN_SECS,
            refresh_token: token.refresh_token.clone(),
            scope: token.scope.clone(),
            platform_url: token.platform_url.clone(),
            sid: token.session.sid.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use crate::upstream::UpstreamSession;

    fn manager() -> TokenManager {
        TokenManager::new(Arc::new(MemoryRecordStore::new()), ServerConfig::default())
    }

    fn issued(refresh_count: u32, session_expires_in_hours: i64) -> IssuedToken {
        let now = Utc::now();
        IssuedToken {
            access_token: "at-1".to_owned(),
            refresh_token: "rt-1".to_owned(),
            client_id: "mcp-public-client".to_owned(),
            scope: "profile".to_owned(),
            session: UpstreamSession {
                sid: "sid-1".to_owned(),
                info: serde_json::Value::Null,
                session_hours: Some(24),
            },
            platform_url: "https://demo.intelligencebank.com".to_owned(),
            created_at: now,
            expires_at: now + Duration::seconds(ttl::ACCESS_TOKEN_SECS),
            session_expires_at: now + Duration::hours(session_expires_in_hours),
            session_created_at: now,
            refresh_count,
        }
    }

    #[test]
    fn refresh_limit_is_enforced() {
        let record = issued(10, 24);
        let err = manager().validate_refresh_attempt(&record).unwrap_err();
        assert_eq!(err.oauth_code(), "invalid_grant");
        assert!(matches!(err, AuthError::RefreshLimitExceeded));
    }

    #[test]
    fn expired_session_cannot_refresh() {
        let record = issued(0, -1);
        assert!(matches!(
            manager().validate_refresh_attempt(&record),
            Err(AuthError::SessionExpired)
        ));
    }

    #[test]
    fn lookahead_flags_sessions_near_expiry() {
        let mut record = issued(0, 24);
        assert!(!TokenManager::needs_session_refresh(&record));

        record.session_expires_at = Utc::now() + Duration::seconds(60);
        assert!(TokenManager::needs_session_refresh(&record));
    }
}
