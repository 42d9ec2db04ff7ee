//! Password hashing and one-time secret generation

use std::sync::OnceLock;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::{Rng, distributions::Alphanumeric};

use crate::error::{PortalError, PortalResult};

/// Length of the opaque password reset token
pub const RESET_TOKEN_LENGTH: usize = 64;

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> PortalResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortalError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored hash
pub fn verify_password(password: &str, password_hash: &str) -> PortalResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| PortalError::Internal(format!("Failed to parse password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Spend the same argon2 work as a real check, for accounts that do not exist
///
/// Always false. The hash is of a random secret generated once per process.
pub fn verify_missing_account(password: &str) -> bool {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY_HASH.get_or_init(|| hash_password(&generate_reset_token()).ok());

    if let Some(dummy) = dummy {
        let _ = verify_password(password, dummy);
    }
    false
}

/// Six-digit numeric login code
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// High-entropy opaque token for password reset links
pub fn generate_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("secret1").unwrap();
        assert_ne!(hash, "secret1");
        assert!(verify_password("secret1", &hash).unwrap());
        assert!(!verify_password("secret2", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(
            hash_password("secret1").unwrap(),
            hash_password("secret1").unwrap()
        );
    }

    #[test]
    fn test_malformed_hash_is_internal_error() {
        assert!(matches!(
            verify_password("secret1", "not-a-hash"),
            Err(PortalError::Internal(_))
        ));
    }

    #[test]
    fn test_missing_account_never_verifies() {
        assert!(!verify_missing_account("secret1"));
        assert!(!verify_missing_account(""));
    }

    #[test]
    fn test_otp_is_six_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_reset_tokens_are_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), RESET_TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
