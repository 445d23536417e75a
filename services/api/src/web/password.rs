//! services/api/src/web/password.rs
//!
//! Password hashing (argon2) and the password strength policy.

use crate::error::ApiError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::error;

const MIN_PASSWORD_LENGTH: usize = 8;

static PASSWORD_RULES: LazyLock<[(Regex, &'static str); 4]> = LazyLock::new(|| {
    [
        (
            Regex::new("[A-Z]").expect("uppercase pattern is valid"),
            "Password must include at least one uppercase letter.",
        ),
        (
            Regex::new("[a-z]").expect("lowercase pattern is valid"),
            "Password must include at least one lowercase letter.",
        ),
        (
            Regex::new("[0-9]").expect("digit pattern is valid"),
            "Password must include at least one digit.",
        ),
        (
            Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).expect("special character pattern is valid"),
            "Password must include at least one special character.",
        ),
    ]
});

/// Returns the first rule the password breaks, as an `InvalidInput` error.
pub fn check_password_strength(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::invalid(format!(
            "Password must be at least {} characters long.",
            MIN_PASSWORD_LENGTH
        )));
    }
    for (pattern, message) in PASSWORD_RULES.iter() {
        if !pattern.is_match(password) {
            return Err(ApiError::invalid(*message));
        }
    }
    Ok(())
}

/// Hashes a password into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

/// Checks a password against a stored PHC string.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ApiError> {
    let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
