// ABOUTME: Axum route handlers for the OAuth bridge HTTP boundary
// ABOUTME: Serves authorize, poll, token, userinfo, and RFC 8414 discovery endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

use crate::config::ServerConfig;
use crate::errors::AuthError;
use crate::flow::{AuthorizationFlow, AuthorizeRejection};
use crate::models::{StartLoginRequest, TokenRequest};
use crate::token::TokenManager;
use axum::{
    extract::{Form, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state: the flow controller, the token manager, and the
/// runtime configuration for metadata rendering
pub struct AppState {
    pub flow: AuthorizationFlow,
    pub tokens: TokenManager,
    pub config: ServerConfig,
}

/// Query parameters accepted by the authorization endpoint; everything is
/// optional at the HTTP layer so validation errors stay in our taxonomy
/// instead of the extractor's
#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub platform_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PollParams {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// OAuth bridge routes implementation
pub struct BridgeRoutes;

impl BridgeRoutes {
    /// Create the full router with CORS and request tracing
    pub fn routes(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/authorize", get(Self::handle_authorize))
            .route("/authorize/poll", get(Self::handle_poll))
            .route("/callback", get(Self::handle_callback))
            .route("/token", post(Self::handle_token))
            .route("/userinfo", get(Self::handle_userinfo))
            .route(
                "/.well-known/oauth-authorization-server",
                get(Self::handle_metadata),
            )
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Authorization endpoint.
    ///
    /// Browser requests get the platform-URL form; the form resubmits the
    /// same query with `Accept: application/json` plus `platform_url`, which
    /// is the start-login call returning `{loginUrl, token}`.
    async fn handle_authorize(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Query(params): Query<AuthorizeParams>,
    ) -> Response {
        let wants_json = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("application/json"));

        let request = match Self::to_start_login(&params) {
            Ok(request) => request,
            Err(error) => return error.into_response(),
        };

        if wants_json && params.platform_url.is_some() {
            return Self::start_login(&state, request).await;
        }

        // Validate before rendering so an unknown client or hostile redirect
        // URI never gets a usable form
        match state.flow.validate_authorize(&request) {
            Ok(_) => Html(render_authorize_form(&params)).into_response(),
            Err(rejection) => Self::reject(rejection),
        }
    }

    async fn start_login(state: &Arc<AppState>, request: StartLoginRequest) -> Response {
        let validated = match state.flow.validate_authorize(&request) {
            Ok(validated) => validated,
            Err(rejection) => return Self::reject(rejection),
        };

        match state.flow.start_login(validated).await {
            Ok(response) => (StatusCode::OK, Json(response)).into_response(),
            Err(error) => error.into_response(),
        }
    }

    /// Poll endpoint: 404 `authorization_pending` until the upstream login
    /// completes, then 200 with the code-bearing callback URL
    async fn handle_poll(
        State(state): State<Arc<AppState>>,
        Query(params): Query<PollParams>,
    ) -> Response {
        let Some(token) = params.token.as_deref() else {
            return AuthError::InvalidRequest("token query parameter is required".into())
                .into_response();
        };

        match state.flow.poll_login(token).await {
            Ok(response) => (StatusCode::OK, Json(response)).into_response(),
            Err(error) => error.into_response(),
        }
    }

    /// Callback endpoint: forwards `code` and `state` to the redirect URI
    /// stored with the code, for user agents that land here rather than
    /// following the poll response
    async fn handle_callback(
        State(state): State<Arc<AppState>>,
        Query(params): Query<CallbackParams>,
    ) -> Response {
        let (Some(code), Some(original_state)) = (params.code.as_deref(), params.state.as_deref())
        else {
            return AuthError::InvalidRequest("Missing authorization code".into()).into_response();
        };

        match state.flow.callback_redirect(code, original_state).await {
            Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
            Err(error) => error.into_response(),
        }
    }

    /// Token endpoint (RFC 6749 §3.2), form-encoded
    async fn handle_token(
        State(state): State<Arc<AppState>>,
        form: Result<Form<TokenRequest>, axum::extract::rejection::FormRejection>,
    ) -> Response {
        let Form(request) = match form {
            Ok(form) => form,
            Err(rejection) => {
                tracing::error!("token request rejected: malformed form body: {rejection}");
                return AuthError::InvalidRequest("Malformed token request body".into())
                    .into_response();
            }
        };

        match state.tokens.handle(&request).await {
            Ok(response) => (StatusCode::OK, Json(response)).into_response(),
            Err(error) => error.into_response(),
        }
    }

    /// Userinfo endpoint: bearer-authenticated claims mapped from the stored
    /// upstream session payload
    async fn handle_userinfo(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
    ) -> Response {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let Some(access_token) = bearer else {
            return Self::unauthorized("Missing or invalid Authorization header");
        };

        match state.tokens.authenticate(access_token).await {
            Ok(record) => {
                let info = &record.session.info;
                let first = info.pointer("/info/firstname").and_then(|v| v.as_str());
                let last = info.pointer("/info/lastname").and_then(|v| v.as_str());
                let name = match (first, last) {
                    (Some(f), Some(l)) => Some(format!("{f} {l}")),
                    (Some(f), None) => Some(f.to_owned()),
                    (None, Some(l)) => Some(l.to_owned()),
                    (None, None) => None,
                };

                Json(serde_json::json!({
                    "sub": info
                        .pointer("/session/userUuid")
                        .and_then(|v| v.as_str())
                        .unwrap_or(record.session.sid.as_str()),
                    "name": name,
                    "given_name": first,
                    "family_name": last,
                    "email": info.pointer("/info/email").and_then(|v| v.as_str()),
                    "email_verified": info.pointer("/info/email").is_some(),
                }))
                .into_response()
            }
            Err(error) => Self::unauthorized(&error.to_string()),
        }
    }

    /// RFC 8414 authorization-server metadata
    async fn handle_metadata(State(state): State<Arc<AppState>>) -> Response {
        let issuer = &state.config.issuer_url;
        Json(serde_json::json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/authorize"),
            "token_endpoint": format!("{issuer}/token"),
            "userinfo_endpoint": format!("{issuer}/userinfo"),
            "grant_types_supported": ["authorization_code", "refresh_token"],
            "response_types_supported": ["code"],
            "response_modes_supported": ["query"],
            "token_endpoint_auth_methods_supported": ["none"],
            "scopes_supported": ["profile"],
            "code_challenge_methods_supported": ["S256"]
        }))
        .into_response()
    }

    fn to_start_login(params: &AuthorizeParams) -> Result<StartLoginRequest, AuthError> {
        let client_id = params
            .client_id
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthError::InvalidRequest("client_id is required".into()))?;
        let redirect_uri = params
            .redirect_uri
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthError::InvalidRequest("redirect_uri is required".into()))?;

        Ok(StartLoginRequest {
            platform_url: params.platform_url.clone().unwrap_or_default(),
            response_type: params.response_type.clone(),
            client_id,
            redirect_uri,
            scope: params.scope.clone(),
            state: params.state.clone(),
            code_challenge: params.code_challenge.clone(),
            code_challenge_method: params.code_challenge_method.clone(),
        })
    }

    fn reject(rejection: AuthorizeRejection) -> Response {
        match rejection {
            AuthorizeRejection::Direct(error) => error.into_response(),
            AuthorizeRejection::Redirect {
                redirect_uri,
                state,
                error,
            } => {
                // 302 per RFC 6749 §4.1.2.1
                let location = error.redirect_location(&redirect_uri, state.as_deref());
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
        }
    }

    fn unauthorized(message: &str) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer error=\"invalid_token\"")],
            Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}

/// Render the platform-URL form, echoing the OAuth parameters as hidden
/// fields so the JSON resubmission carries the full request
fn render_authorize_form(params: &AuthorizeParams) -> String {
    let field = |value: &Option<String>| escape_html(value.as_deref().unwrap_or(""));
    FORM_HTML
        .replace("{{client_id}}", &field(&params.client_id))
        .replace("{{redirect_uri}}", &field(&params.redirect_uri))
        .replace("{{response_type}}", &field(&params.response_type))
        .replace("{{scope}}", &field(&params.scope))
        .replace("{{state}}", &field(&params.state))
        .replace("{{code_challenge}}", &field(&params.code_challenge))
        .replace(
            "{{code_challenge_method}}",
            &field(&params.code_challenge_method),
        )
        .replace("{{platform_url}}", &field(&params.platform_url))
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// Embedded so the binary has no filesystem dependency at runtime
const FORM_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>IntelligenceBank OAuth</title>
    <style>
        body { font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; max-width: 480px; margin: 40px auto; padding: 20px; background: #f4f5f7; color: #172b4d; }
        .container { background: #fff; padding: 32px; border-radius: 8px; box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
        h2 { text-align: center; }
        label { display: block; margin-bottom: 8px; font-weight: 500; }
        input[type="url"] { width: 100%; padding: 8px 12px; border: 2px solid #dfe1e6; border-radius: 4px; box-sizing: border-box; }
        button { display: block; width: 100%; padding: 10px 16px; margin-top: 24px; color: white; background: #F68D32; border: none; border-radius: 4px; cursor: pointer; }
        button:disabled { opacity: 0.6; cursor: not-allowed; }
        #login-container { display: none; margin-top: 20px; }
        .status { margin: 16px 0; padding: 12px; border-radius: 4px; background: #f4f5f7; }
        .status.error { background: #ffebe6; color: #de350b; }
    </style>
</head>
<body>
    <div class="container">
        <h2>Connect to IntelligenceBank</h2>
        <div id="url-form">
            <form id="platform-form">
                <input type="hidden" name="client_id" value="{{client_id}}">
                <input type="hidden" name="redirect_uri" value="{{redirect_uri}}">
                <input type="hidden" name="response_type" value="{{response_type}}">
                <input type="hidden" name="scope" value="{{scope}}">
                <input type="hidden" name="state" value="{{state}}">
                <input type="hidden" name="code_challenge" value="{{code_challenge}}">
                <input type="hidden" name="code_challenge_method" value="{{code_challenge_method}}">
                <label for="platform_url">Platform URL:</label>
                <input type="url" id="platform_url" name="platform_url" value="{{platform_url}}"
                       placeholder="https://company.intelligencebank.com" required>
                <button type="submit">Continue to Login</button>
            </form>
        </div>
        <div id="login-container">
            <h2>Complete Login</h2>
            <div class="status" id="status-message">Waiting for login completion...</div>
        </div>
    </div>
    <script>
        function showStatus(message, kind) {
            const el = document.getElementById('status-message');
            el.textContent = message;
            el.className = 'status' + (kind ? ' ' + kind : '');
        }

        document.getElementById('platform-form').onsubmit = async function(e) {
            e.preventDefault();
            const button = e.target.querySelector('button');
            button.disabled = true;
            const data = {};
            for (const input of e.target.elements) {
                if (input.name) data[input.name] = input.value;
            }
            try {
                const response = await fetch('?' + new URLSearchParams(data), {
                    headers: { 'Accept': 'application/json' }
                });
                const body = await response.json();
                if (response.ok && body.loginUrl) {
                    document.getElementById('url-form').style.display = 'none';
                    document.getElementById('login-container').style.display = 'block';
                    window.open(body.loginUrl, 'ib_login', 'width=800,height=600');
                    poll(body.token);
                } else {
                    showStatus(body.error_description || 'Failed to start login', 'error');
                    button.disabled = false;
                }
            } catch (err) {
                showStatus('Failed to initialize login', 'error');
                button.disabled = false;
            }
        };

        function poll(token) {
            const interval = setInterval(async () => {
                try {
                    const response = await fetch(window.location.pathname + '/poll?token=' + token);
                    const body = await response.json();
                    if (response.ok && body.redirect_url) {
                        clearInterval(interval);
                        showStatus('Login successful, redirecting...');
                        window.location.href = body.redirect_url;
                    } else if (response.status !== 404) {
                        clearInterval(interval);
                        showStatus(body.error_description || 'Login failed', 'error');
                    } else if (body.error === 'authorization_timeout') {
                        clearInterval(interval);
                        showStatus('Login timed out, please try again', 'error');
                    }
                } catch (err) {
                    // transient network failure; keep polling
                }
            }, 2000);
        }
    </script>
</body>
</html>
"#;
