/// Authentication module
///
/// Credential hashing, the signing keyring, JWT issuance and validation,
/// and the login / authorize / refresh session flows built on top of them.

mod claims;
mod clock;
mod error;
mod jwt;
mod keyring;
mod password;
mod session;

pub use claims::{Claims, TokenClass, ISSUER};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::AuthError;
pub use jwt::{issue_token, validate_token};
pub use keyring::SecretKeyring;
pub use password::{
    hash_password, validate_password_policy, verify_password, DEFAULT_HASH_COST,
    MAX_PASSWORD_BYTES,
};
pub use session::{SessionManager, TokenPair};
