// ABOUTME: Main library entry point for the IntelligenceBank OAuth bridge
// ABOUTME: Exposes the flow controller, token manager, record store, and HTTP routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

#![deny(unsafe_code)]

//! # IntelligenceBank OAuth Bridge
//!
//! An OAuth 2.0 authorization server that bridges standards-compliant
//! clients (MCP integrations in particular) onto IntelligenceBank's
//! proprietary asynchronous login flow.
//!
//! The provider never redirects back to the bridge. Instead, the bridge
//! obtains an initiation token, sends the user's browser to the tenant
//! login page, and polls the provider until the login completes — at which
//! point the poll-token is promoted to a single-use authorization code and
//! the standard code/PKCE exchange takes over.
//!
//! ## Components
//!
//! - **Record Store** ([`store`]): the only consistency boundary; pending
//!   authorizations and issued tokens with lazy expiry at read time
//! - **Authorization Flow** ([`flow`]): start-login, completion polling,
//!   and poll-token → code promotion
//! - **Token Lifecycle** ([`token`]): code exchange, rotating refresh with
//!   bounded count and an absolute session-age ceiling, bearer auth
//! - **Upstream Client** ([`upstream`]): the provider's proprietary
//!   handshake behind a trait, with 404 mapped to "login pending"
//! - **HTTP boundary** ([`routes`]): axum handlers for authorize, poll,
//!   token, userinfo, and RFC 8414 discovery

/// Runtime configuration and the well-known client registry
pub mod config;

/// TTLs, session limits, entropy sizes, and upstream endpoint paths
pub mod constants;

/// Error taxonomy with RFC 6749 wire mapping
pub mod errors;

/// Authorization flow controller
pub mod flow;

/// Tracing subscriber setup
pub mod logging;

/// Record types and OAuth wire structures
pub mod models;

/// PKCE verification and opaque credential generation
pub mod pkce;

/// HTTP route handlers
pub mod routes;

/// Record store trait and the in-memory backend
pub mod store;

/// Token lifecycle manager
pub mod token;

/// Upstream session provider client
pub mod upstream;
