//! Authentication failure kinds.

use thiserror::Error;

/// Every way a credential or token can be rejected.
///
/// The token variants are kept distinct for logging; callers outside the
/// session layer only ever see `Unauthorized` for them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Unknown user or wrong password. Deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token does not decode into header, payload and signature.
    #[error("Malformed token")]
    Malformed,

    /// Header declares anything other than HS256.
    #[error("Unsupported token algorithm")]
    UnsupportedAlgorithm,

    /// HMAC does not match the secret the token was checked against.
    #[error("Invalid token signature")]
    SignatureInvalid,

    #[error("Token has expired")]
    Expired,

    /// Payload is signed correctly but its claims are unusable.
    #[error("Invalid token claims")]
    ClaimsInvalid,

    /// Token refers to an identity that no longer exists.
    #[error("Identity not found")]
    IdentityNotFound,

    /// The password hashing primitive failed.
    #[error("Password hashing failed: {0}")]
    HashingFailure(String),

    /// Token could not be signed.
    #[error("Token issuance failed: {0}")]
    IssuanceFailure(String),

    /// Uniform rejection returned by the authorization gate.
    #[error("Unauthorized")]
    Unauthorized,
}

impl AuthError {
    /// True for the failures produced by token validation.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            AuthError::Malformed
                | AuthError::UnsupportedAlgorithm
                | AuthError::SignatureInvalid
                | AuthError::Expired
                | AuthError::ClaimsInvalid
        )
    }
}
