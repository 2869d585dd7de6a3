//! Password hashing utilities

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{CatalogError, CatalogResult};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> CatalogResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CatalogError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// How a stored password value is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredPassword {
    Argon2,
    /// `$2a$`, `$2b$` and `$2y$` values written by older deployments
    Bcrypt,
    Plaintext,
}

impl StoredPassword {
    pub fn classify(stored: &str) -> Self {
        if stored.starts_with("$argon2") {
            StoredPassword::Argon2
        } else if ["$2a$", "$2b$", "$2y$"].iter().any(|p| stored.starts_with(p)) {
            StoredPassword::Bcrypt
        } else {
            StoredPassword::Plaintext
        }
    }
}

/// Whether a stored password is already in the current hash format.
/// Anything else should be re-hashed after a successful login.
pub fn is_hashed(stored: &str) -> bool {
    StoredPassword::classify(stored) == StoredPassword::Argon2
}

/// Verify a password against a stored value.
///
/// Records imported from older deployments may hold a bcrypt hash or still
/// the plaintext password; the caller is expected to upgrade them with
/// [`hash_password`] after a successful login.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match StoredPassword::classify(stored) {
        StoredPassword::Argon2 => match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        },
        StoredPassword::Bcrypt => bcrypt::verify(password, stored).unwrap_or(false),
        StoredPassword::Plaintext => constant_time_eq(password.as_bytes(), stored.as_bytes()),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Minimal password policy for accounts created through the API
pub fn validate_new_password(password: &str) -> CatalogResult<()> {
    if password.chars().count() < 6 {
        return Err(CatalogError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(is_hashed(&hash));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_legacy_plaintext() {
        assert!(!is_hashed("letmein"));
        assert!(verify_password("letmein", "letmein"));
        assert!(!verify_password("letmeout", "letmein"));
        assert!(!verify_password("", "letmein"));
    }

    #[test]
    fn test_bcrypt_hashes_verify() {
        let stored = bcrypt::hash("secret", 4).unwrap();
        assert!(stored.starts_with("$2b$"));
        assert_eq!(StoredPassword::classify(&stored), StoredPassword::Bcrypt);
        assert!(!is_hashed(&stored));

        assert!(verify_password("secret", &stored));
        assert!(!verify_password("Secret", &stored));
        // The hash itself is not a usable password
        assert!(!verify_password(&stored, &stored));
    }

    #[test]
    fn test_malformed_hashes_never_match() {
        let broken = "$2b$10$not-a-real-hash";
        assert!(!verify_password(broken, broken));
        let broken = "$argon2id$v=19$garbage";
        assert!(!verify_password(broken, broken));
        assert_eq!(StoredPassword::classify("hunter2"), StoredPassword::Plaintext);
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_new_password("12345").is_err());
        assert!(validate_new_password("123456").is_ok());
    }
}
