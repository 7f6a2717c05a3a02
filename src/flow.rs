// ABOUTME: Authorization flow controller driving start-login, polling, and code promotion
// ABOUTME: Validates OAuth parameters against the client registry before touching upstream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

use crate::config::ClientRegistry;
use crate::constants::{entropy, oauth, ttl};
use crate::errors::{AuthError, StoreError};
use crate::models::{PendingAuthorization, PollResponse, StartLoginRequest, StartLoginResponse};
use crate::pkce;
use crate::store::RecordStore;
use crate::upstream::{SessionPoll, SessionProvider, UpstreamToken};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

/// How an authorization-request rejection must reach the client.
///
/// Until the client identity and redirect URI have been validated, errors are
/// answered directly; redirecting to an unvetted URI would make the bridge an
/// open redirector. Once both check out, RFC 6749 §4.1.2.1 requires errors to
/// be delivered on the redirect URI instead.
#[derive(Debug)]
pub enum AuthorizeRejection {
    /// Client or redirect URI failed validation: answer in place
    Direct(AuthError),
    /// Client and redirect URI are trusted: deliver on the callback
    Redirect {
        redirect_uri: String,
        state: Option<String>,
        error: AuthError,
    },
}

/// A start-login request that passed validation, with defaults applied
#[derive(Debug, Clone)]
pub struct ValidatedAuthorize {
    pub platform_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// Orchestrates the bridge side of the asynchronous login: initiate upstream,
/// hand the browser off, poll for completion, and promote the poll-token to a
/// single-use authorization code.
pub struct AuthorizationFlow {
    store: Arc<dyn RecordStore>,
    upstream: Arc<dyn SessionProvider>,
    registry: Arc<ClientRegistry>,
}

impl AuthorizationFlow {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        upstream: Arc<dyn SessionProvider>,
        registry: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            store,
            upstream,
            registry,
        }
    }

    /// Validate an authorization request against the client registry.
    ///
    /// # Errors
    ///
    /// `AuthorizeRejection::Direct` for unknown clients and disallowed
    /// redirect URIs; `AuthorizeRejection::Redirect` for everything found
    /// after the callback is known trustworthy.
    pub fn validate_authorize(
        &self,
        request: &StartLoginRequest,
    ) -> Result<ValidatedAuthorize, AuthorizeRejection> {
        let Some(client) = self.registry.get(&request.client_id) else {
            error!(client_id = %request.client_id, "authorization rejected: unknown client");
            return Err(AuthorizeRejection::Direct(AuthError::UnauthorizedClient(
                "Unknown client_id".into(),
            )));
        };

        if !client.allows_redirect(&request.redirect_uri) {
            error!(
                client_id = %request.client_id,
                redirect_uri = %request.redirect_uri,
                "authorization rejected: redirect_uri not allowed for client"
            );
            return Err(AuthorizeRejection::Direct(AuthError::UnauthorizedClient(
                "redirect_uri is not allowed for this client".into(),
            )));
        }

        // From here on the callback is trusted and errors are redirected
        let reject = |error: AuthError| AuthorizeRejection::Redirect {
            redirect_uri: request.redirect_uri.clone(),
            state: request.state.clone(),
            error,
        };

        match request.response_type.as_deref() {
            Some(oauth::RESPONSE_TYPE_CODE) | None => {}
            Some(other) => {
                error!(response_type = %other, "authorization rejected: unsupported response_type");
                return Err(reject(AuthError::InvalidRequest(
                    "Only response_type=code is supported".into(),
                )));
            }
        }

        // Empty is allowed here: the form-render pass has no platform URL
        // yet; start_login requires one
        if !request.platform_url.is_empty()
            && url::Url::parse(&request.platform_url)
                .map(|u| u.scheme() != "http" && u.scheme() != "https")
                .unwrap_or(true)
        {
            error!(platform_url = %request.platform_url, "authorization rejected: bad platform_url");
            return Err(reject(AuthError::InvalidRequest(
                "platform_url must be a valid http(s) URL".into(),
            )));
        }

        match (
            request.code_challenge.as_deref(),
            request.code_challenge_method.as_deref(),
        ) {
            (Some(_), Some(oauth::PKCE_METHOD_S256)) => {}
            (Some(_), Some(other)) => {
                error!(method = %other, "authorization rejected: unsupported PKCE method");
                return Err(reject(AuthError::InvalidRequest(
                    "Only the S256 code_challenge_method is supported".into(),
                )));
            }
            (Some(_), None) => {
                return Err(reject(AuthError::InvalidRequest(
                    "code_challenge_method is required with code_challenge".into(),
                )));
            }
            (None, _) if client.requires_pkce => {
                error!(client_id = %client.client_id, "authorization rejected: PKCE required");
                return Err(reject(AuthError::InvalidRequest(
                    "PKCE code_challenge is required for this client".into(),
                )));
            }
            (None, _) => {}
        }

        Ok(ValidatedAuthorize {
            platform_url: request.platform_url.trim_end_matches('/').to_owned(),
            client_id: request.client_id.clone(),
            redirect_uri: request.redirect_uri.clone(),
            scope: request
                .scope
                .clone()
                .unwrap_or_else(|| oauth::DEFAULT_SCOPE.to_owned()),
            state: request.state.clone(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request.code_challenge_method.clone(),
        })
    }

    /// Start a login: obtain an initiation token upstream and persist the
    /// pending record under a fresh poll-token.
    ///
    /// # Errors
    ///
    /// `AuthError::ServerError` on upstream or storage failure.
    pub async fn start_login(
        &self,
        validated: ValidatedAuthorize,
    ) -> Result<StartLoginResponse, AuthError> {
        if validated.platform_url.is_empty() {
            return Err(AuthError::InvalidRequest("platform_url is required".into()));
        }

        let login = self.upstream.initiate(&validated.platform_url).await?;
        let login_url = self.upstream.login_url(&validated.platform_url, &login);

        let poll_token = pkce::generate_urlsafe_secret(entropy::POLL_TOKEN_BYTES)?;
        let now = Utc::now();

        let record = PendingAuthorization {
            key: poll_token.clone(),
            client_id: validated.client_id,
            redirect_uri: validated.redirect_uri,
            scope: validated.scope,
            upstream: UpstreamToken::Initiated(login),
            platform_url: validated.platform_url,
            original_state: validated.state,
            code_challenge: validated.code_challenge,
            code_challenge_method: validated.code_challenge_method,
            created_at: now,
            expires_at: now + Duration::seconds(ttl::PENDING_AUTHORIZATION_SECS),
        };

        self.store.put_pending(record).await.map_err(|e| {
            error!("failed to persist pending authorization: {e}");
            AuthError::ServerError("Failed to persist authorization state".into())
        })?;

        info!("login started, awaiting upstream completion");

        Ok(StartLoginResponse {
            login_url,
            token: poll_token,
        })
    }

    /// Check whether the login behind `poll_token` has completed; on
    /// completion, mint the authorization code and build the callback URL.
    ///
    /// # Errors
    ///
    /// `AuthorizationPending` while the user has not finished (rendered as
    /// 404 so the client loop keeps polling), `AuthorizationTimeout` once the
    /// pending window lapses, `InvalidRequest` for unknown poll-tokens.
    pub async fn poll_login(&self, poll_token: &str) -> Result<PollResponse, AuthError> {
        let record = match self.store.get_pending(poll_token).await {
            Ok(record) => record,
            Err(StoreError::Expired) => {
                info!("pending authorization expired before login completed");
                return Err(AuthError::AuthorizationTimeout);
            }
            Err(StoreError::NotFound) => {
                error!("poll rejected: unknown poll token");
                return Err(AuthError::InvalidRequest("Invalid or expired token".into()));
            }
        };

        let UpstreamToken::Initiated(login) = &record.upstream else {
            // Poll records always hold an initiation token; a session here
            // means the key leaked across record families
            error!("poll rejected: record is not awaiting login");
            return Err(AuthError::InvalidRequest("Invalid or expired token".into()));
        };

        let session = match self
            .upstream
            .check_session(&record.platform_url, login)
            .await?
        {
            SessionPoll::Pending => {
                debug!("upstream login still pending");
                return Err(AuthError::AuthorizationPending);
            }
            SessionPoll::Complete(session) => session,
        };

        let code = pkce::generate_urlsafe_secret(entropy::AUTH_CODE_BYTES)?;
        let mut promoted = record.clone();
        promoted.key = code.clone();
        promoted.upstream = UpstreamToken::Session(session);

        if let Err(e) = self
            .store
            .promote_pending(poll_token, &code, promoted)
            .await
        {
            // A concurrent poll won the promotion; it alone delivers the code
            error!("promotion lost to concurrent poll: {e}");
            return Err(AuthError::InvalidRequest("Invalid or expired token".into()));
        }

        info!("login complete, authorization code issued");

        let mut params = vec![("code", code)];
        if let Some(state) = &record.original_state {
            params.push(("state", state.clone()));
        }
        let redirect_url = url::Url::parse_with_params(&record.redirect_uri, &params)
            .map_err(|e| {
                error!("stored redirect_uri failed to parse: {e}");
                AuthError::ServerError("Failed to build callback URL".into())
            })?
            .into();

        Ok(PollResponse { redirect_url })
    }

    /// Rebuild the client callback URL for an issued code, for user agents
    /// that land on the bridge instead of following the poll response. The
    /// record is read, not consumed; the code stays exchangeable.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when the code is unknown or its record has expired.
    pub async fn callback_redirect(&self, code: &str, state: &str) -> Result<String, AuthError> {
        let record = self.store.get_pending(code).await.map_err(|e| {
            error!("callback rejected: {e}");
            AuthError::InvalidRequest("Invalid authorization code".into())
        })?;

        let location = url::Url::parse_with_params(
            &record.redirect_uri,
            &[("code", code), ("state", state)],
        )
        .map_err(|e| {
            error!("stored redirect_uri failed to parse: {e}");
            AuthError::ServerError("Failed to build callback URL".into())
        })?;

        Ok(location.into())
    }
}
