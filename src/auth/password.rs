/// Password Hashing and Verification
///
/// bcrypt with a configurable work factor. bcrypt only looks at the first
/// 72 bytes of its input, so longer passwords are refused outright rather
/// than silently truncated.

use bcrypt::{hash, verify};

use crate::auth::AuthError;
use crate::error::ValidationError;

pub const DEFAULT_HASH_COST: u32 = 10;
pub const MAX_PASSWORD_BYTES: usize = 72;
const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password using bcrypt
///
/// # Errors
/// `HashingFailure` if the password exceeds 72 bytes or bcrypt rejects
/// the input or cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::HashingFailure(format!(
            "password exceeds {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }

    hash(password, cost).map_err(|e| AuthError::HashingFailure(e.to_string()))
}

/// Verify a plaintext password against a stored bcrypt hash
///
/// # Errors
/// - `InvalidCredentials` if the password does not match
/// - `HashingFailure` if the stored hash cannot be parsed
pub fn verify_password(password: &str, password_hash: &str) -> Result<(), AuthError> {
    // Nothing this long was ever hashed, so it cannot match.
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::InvalidCredentials);
    }

    match verify(password, password_hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AuthError::InvalidCredentials),
        Err(e) => Err(AuthError::HashingFailure(e.to_string())),
    }
}

/// Registration-time password policy.
///
/// Requirements:
/// - At least 8 characters
/// - At most 72 bytes
pub fn validate_password_policy(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password"));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password", MIN_PASSWORD_LENGTH));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_BYTES));
    }

    Ok(())
}
