// ABOUTME: PKCE S256 verification and opaque credential generation
// ABOUTME: All secrets come from the system CSPRNG and compare in constant time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

use crate::errors::AuthError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generate a base64url-encoded secret from `num_bytes` of CSPRNG output.
///
/// Used for access tokens, refresh tokens, authorization codes, and
/// poll-tokens; the encoded value is unpadded and URL safe so it can travel
/// in query strings unescaped.
///
/// # Errors
///
/// Returns `AuthError::ServerError` if the system randomness source fails.
pub fn generate_urlsafe_secret(num_bytes: usize) -> Result<String, AuthError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; num_bytes];
    rng.fill(&mut bytes).map_err(|_| {
        tracing::error!("system randomness source failed");
        AuthError::ServerError("Failed to generate secure token".into())
    })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// RFC 7636 §4.1 code-verifier charset and length check
#[must_use]
pub fn is_valid_verifier(verifier: &str) -> bool {
    (43..=128).contains(&verifier.len())
        && verifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

/// Compute the S256 challenge for a verifier:
/// `BASE64URL-ENCODE(SHA256(ASCII(code_verifier)))`
#[must_use]
pub fn challenge_s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Verify an S256 code verifier against its stored challenge.
///
/// The comparison is constant time so exchange latency leaks nothing about
/// how much of the challenge matched.
///
/// # Errors
///
/// `AuthError::InvalidRequest` when the verifier violates the RFC 7636
/// format; `AuthError::InvalidGrant` when a well-formed verifier does not
/// match the stored challenge.
pub fn verify_s256(verifier: &str, challenge: &str) -> Result<(), AuthError> {
    if !is_valid_verifier(verifier) {
        tracing::error!("PKCE verifier rejected: malformed code_verifier");
        return Err(AuthError::InvalidRequest(
            "code_verifier violates the RFC 7636 format".into(),
        ));
    }

    let computed = challenge_s256(verifier);
    if computed.as_bytes().ct_eq(challenge.as_bytes()).into() {
        Ok(())
    } else {
        tracing::error!("PKCE verifier rejected: challenge mismatch");
        Err(AuthError::InvalidGrant("Invalid code verifier".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Appendix B of RFC 7636
    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn rfc7636_test_vector_verifies() {
        assert_eq!(challenge_s256(RFC_VERIFIER), RFC_CHALLENGE);
        assert!(verify_s256(RFC_VERIFIER, RFC_CHALLENGE).is_ok());
    }

    #[test]
    fn mismatched_verifier_is_invalid_grant() {
        let err = verify_s256(
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            RFC_CHALLENGE,
        )
        .unwrap_err();
        assert_eq!(err.oauth_code(), "invalid_grant");
    }

    #[test]
    fn short_or_charset_violating_verifiers_are_rejected() {
        assert!(!is_valid_verifier("too-short"));
        assert!(!is_valid_verifier(&"a".repeat(129)));
        assert!(!is_valid_verifier(&format!("{}+", "a".repeat(43))));
        assert!(is_valid_verifier(&"a".repeat(43)));
    }

    #[test]
    fn generated_secrets_are_urlsafe_and_distinct() {
        let a = generate_urlsafe_secret(32).unwrap();
        let b = generate_urlsafe_secret(32).unwrap();
        assert_ne!(a, b);
        // 32 bytes -> 43 unpadded base64url characters
        assert_eq!(a.len(), 43);
        assert!(a
            .bytes()
            .all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_'));
    }
}
