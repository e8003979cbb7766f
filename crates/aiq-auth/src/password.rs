//! Password hashing and strength validation.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::AuthError;

const MIN_PASSWORD_LENGTH: usize = 8;

/// Hashes a plaintext password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::HashError(e.to_string()))
}

/// Verifies a plaintext password against a stored Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// A minimal strength gate: length plus at least one letter and one digit.
/// Deployments that want zxcvbn-style scoring can replace this at the
/// boundary without touching the hashing path.
pub fn is_strong_enough(password: &str) -> bool {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return false;
    }
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    has_letter && has_digit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrips() {
        let hash = hash_password("correcthorsebattery1").unwrap();
        assert!(verify_password("correcthorsebattery1", &hash));
    }

    #[test]
    fn wrong_password_fails_verification() {
        let hash = hash_password("correcthorsebattery1").unwrap();
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn each_hash_uses_a_distinct_salt() {
        let a = hash_password("correcthorsebattery1").unwrap();
        let b = hash_password("correcthorsebattery1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_fails_closed() {
        assert!(!verify_password("anything", "not-a-valid-hash"));
    }

    #[test]
    fn rejects_short_passwords() {
        assert!(!is_strong_enough("ab1"));
    }

    #[test]
    fn rejects_letters_only() {
        assert!(!is_strong_enough("onlyletters"));
    }

    #[test]
    fn accepts_letters_and_digits_above_minimum_length() {
        assert!(is_strong_enough("goodpassword1"));
    }
}
