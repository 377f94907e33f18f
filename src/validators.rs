/// Input validators for registration
///
/// Usernames end up in token `sub` claims, logs and a VARCHAR(20) column,
/// so they are restricted to a small, printable character set.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 20;

lazy_static! {
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap();
}

/// Validates a username and returns it trimmed.
///
/// - 3 to 20 characters
/// - ASCII letters, digits, `_`, `.` and `-` only
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username"));
    }

    if trimmed.chars().count() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort("username", MIN_USERNAME_LENGTH));
    }

    if trimmed.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username", MAX_USERNAME_LENGTH));
    }

    if !USERNAME_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("username"));
    }

    Ok(trimmed.to_string())
}
