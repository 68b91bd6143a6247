/// Password Hashing and Verification
///
/// Handles password hashing with bcrypt and password strength validation.

use bcrypt::{hash, verify, DEFAULT_COST};
use lazy_static::lazy_static;

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

lazy_static! {
    // Same cost as real hashes, so a miss on the user lookup costs as much as a wrong password
    static ref DUMMY_HASH: String =
        hash("dummy-password-for-unknown-users", DEFAULT_COST).unwrap_or_default();
}

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if:
/// - Password fails validation (too short, weak, etc.)
/// - Bcrypt hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    validate_password_strength(password)?;

    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored bcrypt hash.
///
/// Fails closed: a malformed hash or any bcrypt error counts as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match verify(password, password_hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!(error = %e, "Password verification failed");
            false
        }
    }
}

/// [`verify_password`] on the blocking thread pool, so the adaptive hash does
/// not stall other requests on the same worker.
pub async fn verify_password_blocking(password: String, password_hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Password verification task failed");
            false
        })
}

/// Burn one bcrypt verification for an identifier with no account.
///
/// Always reports a mismatch.
pub async fn verify_dummy_password(password: String) -> bool {
    verify_password_blocking(password, DUMMY_HASH.clone()).await;
    false
}

/// Validate password strength requirements
///
/// Requirements:
/// - Minimum 8 characters
/// - Maximum 128 characters
/// - At least one digit
/// - At least one lowercase letter
/// - At least one uppercase letter
fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password", MIN_PASSWORD_LENGTH));
    }

    // bcrypt only reads the first 72 bytes; the cap also bounds hashing work
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_LENGTH));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(ValidationError::InvalidFormat(
            "password must contain at least one digit, one lowercase letter, and one uppercase letter"
                .to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = hash_password(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("ValidPassword123").expect("Failed to hash password");

        assert!(verify_password("ValidPassword123", &hash));
        assert!(!verify_password("WrongPassword123", &hash));
    }

    #[test]
    fn test_verify_against_garbage_hash_fails_closed() {
        assert!(!verify_password("ValidPassword123", "not-a-bcrypt-hash"));
        assert!(!verify_password("ValidPassword123", ""));
    }

    #[tokio::test]
    async fn test_verify_on_blocking_pool() {
        let hash = hash_password("ValidPassword123").unwrap();

        assert!(verify_password_blocking("ValidPassword123".into(), hash.clone()).await);
        assert!(!verify_password_blocking("nope".into(), hash).await);
    }

    #[tokio::test]
    async fn test_dummy_verification_never_matches() {
        assert!(DUMMY_HASH.starts_with("$2"));
        assert!(!verify_dummy_password("dummy-password-for-unknown-users".into()).await);
        assert!(!verify_dummy_password("SecurePass123".into()).await);
    }

    #[test]
    fn test_weak_passwords() {
        let long_password = "a".repeat(MAX_PASSWORD_LENGTH + 1) + "A1";
        for weak in ["Short1", "NoDigitsPassword", "NOLOWERCASE1", "nouppercase1", long_password.as_str()] {
            assert!(hash_password(weak).is_err(), "accepted weak password {:?}", weak);
        }
    }
}
