//! Bearer token generation and digests
//!
//! Tokens are `<prefix><secret>`; only the SHA-256 digest of the whole token
//! is persisted.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::PrincipalKind;

pub const USER_TOKEN_PREFIX: &str = "mock-token-";
pub const WEBMASTER_TOKEN_PREFIX: &str = "webmaster-token-";

pub fn token_prefix(kind: PrincipalKind) -> &'static str {
    match kind {
        PrincipalKind::User => USER_TOKEN_PREFIX,
        PrincipalKind::Webmaster => WEBMASTER_TOKEN_PREFIX,
    }
}

/// Generate a new token for a principal kind
/// Format: <prefix><64 hex chars>
pub fn generate_token(kind: PrincipalKind) -> String {
    format!(
        "{}{}{}",
        token_prefix(kind),
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Kind implied by a token's prefix, if it has a known one
pub fn token_kind(token: &str) -> Option<PrincipalKind> {
    if token.starts_with(WEBMASTER_TOKEN_PREFIX) {
        Some(PrincipalKind::Webmaster)
    } else if token.starts_with(USER_TOKEN_PREFIX) {
        Some(PrincipalKind::User)
    } else {
        None
    }
}

/// Hex SHA-256 digest stored in place of the token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_prefixes() {
        let user = generate_token(PrincipalKind::User);
        let webmaster = generate_token(PrincipalKind::Webmaster);
        assert!(user.starts_with("mock-token-"));
        assert_eq!(user.len(), USER_TOKEN_PREFIX.len() + 64);
        assert_eq!(token_kind(&webmaster), Some(PrincipalKind::Webmaster));
        assert_eq!(token_kind("opaque"), None);
        assert_ne!(user, generate_token(PrincipalKind::User));
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let digest = hash_token("mock-token-abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_token("mock-token-abc"));
        assert_ne!(digest, hash_token("mock-token-abd"));
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
