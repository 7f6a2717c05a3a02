// ABOUTME: Application constants for record TTLs, session limits, and token entropy
// ABOUTME: Centralizes the tunable values shared by the flow controller and token manager
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

/// Record time-to-live values, enforced lazily at read time
pub mod ttl {
    /// Pending authorizations (poll-token and auth-code records) live 10 minutes
    pub const PENDING_AUTHORIZATION_SECS: i64 = 600;

    /// Issued access tokens live 1 hour, independent of the upstream session
    pub const ACCESS_TOKEN_SECS: i64 = 3600;
}

/// Upstream session bookkeeping limits
pub mod session {
    /// Session lifetime assumed when the platform does not declare one
    pub const DEFAULT_SESSION_HOURS: i64 = 24;

    /// Refresh-token rotations allowed before full re-authentication
    pub const DEFAULT_MAX_REFRESH_COUNT: u32 = 10;

    /// Advisory lookahead before `session_expires_at` at which collaborators
    /// should trigger a refresh (5 minutes)
    pub const REFRESH_LOOKAHEAD_SECS: i64 = 300;
}

/// Entropy sizes for opaque credentials, in raw bytes before base64url encoding
pub mod entropy {
    /// Access and refresh tokens: 256 bits
    pub const OPAQUE_TOKEN_BYTES: usize = 32;

    /// Authorization codes: 256 bits
    pub const AUTH_CODE_BYTES: usize = 32;

    /// Poll tokens: 128 bits (short-lived, single-purpose handles)
    pub const POLL_TOKEN_BYTES: usize = 16;
}

/// OAuth protocol defaults
pub mod oauth {
    /// Scope granted when the start-login request omits one
    pub const DEFAULT_SCOPE: &str = "profile";

    /// The documented zero-configuration client id for MCP integrations
    pub const DOCUMENTED_CLIENT_ID: &str = "mcp-public-client";

    /// Only `code` is supported (authorization-code flow with PKCE)
    pub const RESPONSE_TYPE_CODE: &str = "code";

    /// Only S256 is accepted; the plain PKCE method is rejected outright
    pub const PKCE_METHOD_S256: &str = "S256";
}

/// IntelligenceBank proprietary endpoints, relative to the tenant platform URL
pub mod upstream {
    /// POST here to obtain an initiation token for a browser login
    pub const INITIAL_TOKEN_PATH: &str = "/v1/auth/app/token";

    /// GET with `?token=` to check login completion; 404 means still pending
    pub const SESSION_INFO_PATH: &str = "/v1/auth/app/info";

    /// Browser login entry point, parameterized with the initiation token
    pub const LOGIN_PATH: &str = "/auth/";
}
