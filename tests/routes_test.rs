// ABOUTME: HTTP boundary tests exercising the axum router end to end
// ABOUTME: Drives the full authorize/poll/token/userinfo sequence with a fake upstream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ib_oauth_bridge::{
    config::{ClientRegistry, ServerConfig},
    errors::AuthError,
    flow::AuthorizationFlow,
    pkce,
    routes::{AppState, BridgeRoutes},
    store::MemoryRecordStore,
    token::TokenManager,
    upstream::{InitiatedLogin, SessionPoll, SessionProvider, UpstreamSession},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

const CLIENT_ID: &str = "mcp-public-client";
const REDIRECT_URI: &str = "http://localhost:9999/callback";
const PLATFORM_URL: &str = "https://demo.intelligencebank.com";
const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

struct FakeSessionProvider {
    complete: AtomicBool,
}

impl FakeSessionProvider {
    fn new() -> Self {
        Self {
            complete: AtomicBool::new(false),
        }
    }

    fn finish_login(&self) {
        self.complete.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionProvider for FakeSessionProvider {
    async fn initiate(&self, _platform_url: &str) -> Result<InitiatedLogin, AuthError> {
        Ok(InitiatedLogin {
            sid: "fake-sid".to_owned(),
            login_token: "fake-login-token".to_owned(),
            session_hours: Some(24),
        })
    }

    async fn check_session(
        &self,
        _platform_url: &str,
        login: &InitiatedLogin,
    ) -> Result<SessionPoll, AuthError> {
        if self.complete.load(Ordering::SeqCst) {
            Ok(SessionPoll::Complete(UpstreamSession {
                sid: "fake-session-sid".to_owned(),
                info: serde_json::json!({
                    "session": { "sid": "fake-session-sid", "userUuid": "user-1" },
                    "info": {
                        "apiV3url": "https://api.demo.intelligencebank.com",
                        "firstname": "Ada",
                        "lastname": "Lovelace",
                        "email": "ada@example.com"
                    }
                }),
                session_hours: login.session_hours,
            }))
        } else {
            Ok(SessionPoll::Pending)
        }
    }

    fn login_url(&self, platform_url: &str, login: &InitiatedLogin) -> String {
        format!("{platform_url}/auth/?login=0&token={}", login.login_token)
    }
}

fn app() -> (Router, Arc<FakeSessionProvider>) {
    let store = Arc::new(MemoryRecordStore::new());
    let provider = Arc::new(FakeSessionProvider::new());
    let registry = Arc::new(ClientRegistry::well_known().unwrap());
    let config = ServerConfig::default();

    let state = Arc::new(AppState {
        flow: AuthorizationFlow::new(store.clone(), provider.clone(), registry),
        tokens: TokenManager::new(store, config.clone()),
        config,
    });

    (BridgeRoutes::routes(state), provider)
}

fn authorize_uri() -> String {
    let challenge = pkce::challenge_s256(VERIFIER);
    format!(
        "/authorize?response_type=code&client_id={CLIENT_ID}\
         &redirect_uri=http%3A%2F%2Flocalhost%3A9999%2Fcallback\
         &state=state-123&code_challenge={challenge}&code_challenge_method=S256\
         &platform_url=https%3A%2F%2Fdemo.intelligencebank.com"
    )
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: &Router, uri: &str, accept_json: bool) -> axum::response::Response {
    let mut builder = Request::builder().uri(uri);
    if accept_json {
        builder = builder.header(header::ACCEPT, "application/json");
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn discovery_metadata_is_served() {
    let (app, _provider) = app();

    let response = get(&app, "/.well-known/oauth-authorization-server", false).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["issuer"], "http://localhost:8080");
    assert_eq!(body["authorization_endpoint"], "http://localhost:8080/authorize");
    assert_eq!(body["token_endpoint"], "http://localhost:8080/token");
    assert_eq!(body["code_challenge_methods_supported"], serde_json::json!(["S256"]));
    assert_eq!(body["response_types_supported"], serde_json::json!(["code"]));
    assert_eq!(
        body["token_endpoint_auth_methods_supported"],
        serde_json::json!(["none"])
    );
}

#[tokio::test]
async fn browser_request_gets_the_platform_form() {
    let (app, _provider) = app();

    let response = get(&app, &authorize_uri(), false).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("platform-form"));
    assert!(html.contains("value=\"state-123\""));
    assert!(html.contains("value=\"mcp-public-client\""));
}

#[tokio::test]
async fn unknown_client_is_a_direct_400() {
    let (app, _provider) = app();

    let uri = "/authorize?client_id=nope&redirect_uri=http%3A%2F%2Flocalhost%3A9999%2Fcallback";
    let response = get(&app, uri, true).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"], "unauthorized_client");
}

#[tokio::test]
async fn post_validation_errors_are_redirected() {
    let (app, _provider) = app();

    let uri = format!(
        "/authorize?response_type=token&client_id={CLIENT_ID}\
         &redirect_uri=http%3A%2F%2Flocalhost%3A9999%2Fcallback&state=state-123"
    );
    let response = get(&app, &uri, true).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(location.starts_with("http://localhost:9999/callback"));
    assert!(location.contains("error=invalid_request"));
    assert!(location.contains("state=state-123"));
}

#[tokio::test]
async fn full_authorization_sequence_over_http() {
    let (app, provider) = app();

    // Start login (scenario A)
    let response = get(&app, &authorize_uri(), true).await;
    assert_eq!(response.status(), StatusCode::OK);
    let started = json_body(response).await;
    assert_eq!(
        started["loginUrl"],
        format!("{PLATFORM_URL}/auth/?login=0&token=fake-login-token")
    );
    let poll_token = started["token"].as_str().unwrap().to_owned();

    // Poll before completion (scenario C)
    let response = get(&app, &format!("/authorize/poll?token={poll_token}"), false).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let pending = json_body(response).await;
    assert_eq!(pending["error"], "authorization_pending");

    // User finishes the browser login
    provider.finish_login();
    let response = get(&app, &format!("/authorize/poll?token={poll_token}"), false).await;
    assert_eq!(response.status(), StatusCode::OK);
    let completed = json_body(response).await;
    let redirect = url::Url::parse(completed["redirect_url"].as_str().unwrap()).unwrap();
    let code = redirect
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    // Exchange the code (form-encoded per RFC 6749)
    let form = serde_urlencoded::to_string([
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", REDIRECT_URI),
        ("client_id", CLIENT_ID),
        ("code_verifier", VERIFIER),
    ])
    .unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = json_body(response).await;
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["sid"], "fake-session-sid");
    let access_token = tokens["access_token"].as_str().unwrap().to_owned();

    // Bearer-authenticated userinfo
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/userinfo")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let claims = json_body(response).await;
    assert_eq!(claims["sub"], "user-1");
    assert_eq!(claims["name"], "Ada Lovelace");
    assert_eq!(claims["email"], "ada@example.com");
}

#[tokio::test]
async fn callback_forwards_code_and_state_to_the_client() {
    let (app, provider) = app();

    let response = get(&app, &authorize_uri(), true).await;
    let started = json_body(response).await;
    let poll_token = started["token"].as_str().unwrap().to_owned();

    provider.finish_login();
    let response = get(&app, &format!("/authorize/poll?token={poll_token}"), false).await;
    let completed = json_body(response).await;
    let redirect = url::Url::parse(completed["redirect_url"].as_str().unwrap()).unwrap();
    let code = redirect
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let response = get(&app, &format!("/callback?code={code}&state=state-123"), false).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(location.starts_with("http://localhost:9999/callback"));
    assert!(location.contains(&format!("code={code}")));
    assert!(location.contains("state=state-123"));

    // Passing through the callback does not consume the code
    let form = serde_urlencoded::to_string([
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", REDIRECT_URI),
        ("client_id", CLIENT_ID),
        ("code_verifier", VERIFIER),
    ])
    .unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn callback_with_unknown_code_is_400() {
    let (app, _provider) = app();

    let response = get(&app, "/callback?code=no-such-code&state=state-123", false).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn callback_requires_code_and_state() {
    let (app, _provider) = app();

    let response = get(&app, "/callback?code=abc", false).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn poll_with_unknown_token_is_400_invalid_request() {
    let (app, _provider) = app();

    let response = get(&app, "/authorize/poll?token=no-such-token", false).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn token_endpoint_rejects_malformed_bodies() {
    let (app, _provider) = app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("grant_type=authorization_code"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn token_endpoint_rejects_unsupported_grants() {
    let (app, _provider) = app();

    let form = serde_urlencoded::to_string([
        ("grant_type", "client_credentials"),
        ("client_id", CLIENT_ID),
    ])
    .unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn userinfo_without_bearer_is_401() {
    let (app, _provider) = app();

    let response = get(&app, "/userinfo", false).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok()),
        Some("Bearer error=\"invalid_token\"")
    );
}
