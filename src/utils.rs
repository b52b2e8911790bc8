use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::errors::AppError;

const MIN_PASSWORD_LENGTH: usize = 8;
const VERIFICATION_TOKEN_BYTES: usize = 32;

/// Length, no whitespace, and one each of lower, upper, digit and symbol.
pub fn check_password_policy(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::invalid(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.chars().any(char::is_whitespace) {
        return Err(AppError::invalid("password must not contain whitespace"));
    }

    let missing = [
        (password.chars().any(|c| c.is_lowercase()), "a lowercase letter"),
        (password.chars().any(|c| c.is_uppercase()), "an uppercase letter"),
        (password.chars().any(|c| c.is_ascii_digit()), "a digit"),
        (password.chars().any(|c| !c.is_alphanumeric()), "a special character"),
    ]
    .into_iter()
    .filter(|(present, _)| !present)
    .map(|(_, what)| what)
    .collect::<Vec<_>>();

    if !missing.is_empty() {
        return Err(AppError::invalid(format!(
            "password must contain {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    check_password_policy(password)?;

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::internal(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|err| AppError::internal(format!("invalid password hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Random hex token for one-time links.
pub fn generate_token() -> String {
    let mut bytes = [0u8; VERIFICATION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Only this digest is persisted; the raw token goes to the user.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.trim().as_bytes()))
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_policy_names_what_is_missing() {
        let err = check_password_policy("alllowercase1").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("uppercase"));
        assert!(message.contains("special"));
        assert!(!message.contains("digit"));

        assert!(check_password_policy("Sh0rt!").is_err());
        assert!(check_password_policy("Has Space1!").is_err());
        assert!(check_password_policy("S3cure!Passw0rd").is_ok());
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("S3cure!Passw0rd").unwrap();
        assert!(verify_password("S3cure!Passw0rd", &hash).unwrap());
        assert!(!verify_password("Wr0ng!Password", &hash).unwrap());
    }

    #[test]
    fn tokens_are_random_and_hash_stably() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&format!(" {a} ")));
        assert_ne!(hash_token(&a), a);
    }
}
