//! Password hashing with Argon2

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Opaque password hashing capability
pub trait HashProvider: Send + Sync {
    fn generate_hash(&self, payload: &str) -> Result<String, PasswordError>;

    /// Returns false for a wrong payload; errors only on an unreadable hash
    fn compare_hash(&self, payload: &str, hash: &str) -> Result<bool, PasswordError>;
}

/// Well-formed Argon2id hash (default parameters) that matches no password.
/// Compared against on unknown logins so they cost as much as known ones.
pub const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$Y2hhdGRlc2stZHVtbXkhIQ$AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

/// Argon2id with default parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2HashProvider;

impl HashProvider for Argon2HashProvider {
    fn generate_hash(&self, payload: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(payload.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    fn compare_hash(&self, payload: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

        Ok(Argon2::default()
            .verify_password(payload.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

/// Minimal policy for staff passwords
pub fn validate_password(password: &str) -> Result<(), PasswordValidationError> {
    if password.len() < 8 {
        return Err(PasswordValidationError::TooShort);
    }
    if password.len() > 128 {
        return Err(PasswordValidationError::TooLong);
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Invalid password hash: {0}")]
    InvalidHash(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordValidationError {
    #[error("Password must be at least 8 characters")]
    TooShort,
    #[error("Password must be at most 128 characters")]
    TooLong,
}
