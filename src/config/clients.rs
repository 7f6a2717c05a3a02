// ABOUTME: Well-known OAuth client registry with regex-validated redirect patterns
// ABOUTME: Pre-configured clients replace Dynamic Client Registration for MCP integrations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

use regex::Regex;
use std::collections::HashMap;

/// Whether a client can keep a secret (RFC 6749 §2.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    /// Browser/desktop client; PKCE is mandatory
    Public,
    /// Server-side client with credentials
    Confidential,
}

/// A statically registered OAuth client.
///
/// Redirect URIs are validated against anchored regex patterns rather than a
/// fixed list so local-development clients can bind any port.
#[derive(Debug, Clone)]
pub struct WellKnownClient {
    pub client_id: String,
    pub client_type: ClientType,
    pub allowed_redirect_patterns: Vec<Regex>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub requires_pkce: bool,
}

impl WellKnownClient {
    /// True if `redirect_uri` matches one of the allowed patterns exactly
    #[must_use]
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.allowed_redirect_patterns
            .iter()
            .any(|pattern| pattern.is_match(redirect_uri))
    }
}

/// Registry of pre-configured clients.
///
/// The bridge supports no Dynamic Client Registration; MCP clients use the
/// documented `mcp-public-client` id for zero-configuration integration.
pub struct ClientRegistry {
    clients: HashMap<String, WellKnownClient>,
}

impl ClientRegistry {
    /// Build the registry of documented clients.
    ///
    /// # Errors
    ///
    /// Returns an error if any built-in redirect pattern fails to compile;
    /// that indicates a programming mistake and is fatal at startup.
    pub fn well_known() -> Result<Self, regex::Error> {
        let patterns = [
            // Production MCP servers
            r"^https://.*\.connectingib\.com/callback$",
            r"^https://mcp\.connectingib\.com/callback$",
            // Claude Desktop callbacks (official MCP client)
            r"^https://claude\.ai/api/mcp/auth_callback$",
            r"^https://claude\.com/api/mcp/auth_callback$",
            // Local development, any port
            r"^http://localhost:\d+/callback$",
            r"^http://127\.0\.0\.1:\d+/callback$",
            // MCP Inspector
            r"^http://localhost:\d+/oauth/callback$",
            r"^http://localhost:\d+/oauth/callback/debug$",
            r"^http://127\.0\.0\.1:\d+/oauth/callback$",
            r"^http://127\.0\.0\.1:\d+/oauth/callback/debug$",
        ];

        let allowed_redirect_patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        let public = WellKnownClient {
            client_id: crate::constants::oauth::DOCUMENTED_CLIENT_ID.to_owned(),
            client_type: ClientType::Public,
            allowed_redirect_patterns,
            grant_types: vec!["authorization_code".to_owned(), "refresh_token".to_owned()],
            response_types: vec!["code".to_owned()],
            requires_pkce: true,
        };

        let mut clients = HashMap::new();
        clients.insert(public.client_id.clone(), public);

        Ok(Self { clients })
    }

    /// Look up a client by id
    #[must_use]
    pub fn get(&self, client_id: &str) -> Option<&WellKnownClient> {
        self.clients.get(client_id)
    }

    /// True if `redirect_uri` is allowed for `client_id`
    #[must_use]
    pub fn validate_redirect_uri(&self, client_id: &str, redirect_uri: &str) -> bool {
        self.get(client_id)
            .is_some_and(|client| client.allows_redirect(redirect_uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::oauth::DOCUMENTED_CLIENT_ID;

    #[test]
    fn documented_client_is_registered() {
        let registry = ClientRegistry::well_known().unwrap();
        let client = registry.get(DOCUMENTED_CLIENT_ID).unwrap();
        assert_eq!(client.client_type, ClientType::Public);
        assert!(client.requires_pkce);
    }

    #[test]
    fn localhost_callbacks_match_any_port() {
        let registry = ClientRegistry::well_known().unwrap();
        assert!(registry
            .validate_redirect_uri(DOCUMENTED_CLIENT_ID, "http://localhost:3000/callback"));
        assert!(registry
            .validate_redirect_uri(DOCUMENTED_CLIENT_ID, "http://127.0.0.1:61234/oauth/callback"));
    }

    #[test]
    fn patterns_are_anchored() {
        let registry = ClientRegistry::well_known().unwrap();
        assert!(!registry.validate_redirect_uri(
            DOCUMENTED_CLIENT_ID,
            "http://localhost:3000/callback/../../evil"
        ));
        assert!(!registry.validate_redirect_uri(
            DOCUMENTED_CLIENT_ID,
            "https://evil.example.com/https://claude.ai/api/mcp/auth_callback"
        ));
        assert!(!registry
            .validate_redirect_uri(DOCUMENTED_CLIENT_ID, "https://evilconnectingib.com/callback"));
    }

    #[test]
    fn unknown_client_is_rejected() {
        let registry = ClientRegistry::well_known().unwrap();
        assert!(registry.get("nope").is_none());
        assert!(!registry.validate_redirect_uri("nope", "http://localhost:3000/callback"));
    }
}
