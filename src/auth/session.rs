/// Session flows
///
/// Login, the access-token gate, and refresh, composed from the hasher,
/// the keyring and the token issuer/validator. Nothing here stores session
/// state: a refresh mints a new pair and leaves the submitted refresh token
/// valid until its own expiry.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::auth::{
    hash_password, issue_token, validate_token, verify_password, AuthError, Claims, Clock,
    SecretKeyring, SystemClock, TokenClass,
};
use crate::error::AppError;
use crate::identity::{Identity, IdentityStore};

const UNKNOWN_USER_PASSWORD: &str = "foodgenie-unknown-user";

/// Access and refresh tokens issued together
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct SessionManager {
    keyring: Arc<SecretKeyring>,
    store: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
    // Verified against when the username is unknown. Hashed at the same
    // cost as stored credentials so both login failures take as long.
    dummy_hash: Arc<str>,
}

impl SessionManager {
    /// `hash_cost` must be the bcrypt cost credentials are stored with.
    ///
    /// # Errors
    /// `AuthError::HashingFailure` if the unknown-user hash cannot be built
    pub fn new(
        keyring: Arc<SecretKeyring>,
        store: Arc<dyn IdentityStore>,
        hash_cost: u32,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hash_password(UNKNOWN_USER_PASSWORD, hash_cost)?;

        Ok(Self {
            keyring,
            store,
            clock: Arc::new(SystemClock),
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// Same keyring and store, different time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    pub fn keyring(&self) -> &SecretKeyring {
        &self.keyring
    }

    /// Verify `username`/`password` and issue a token pair.
    ///
    /// # Errors
    /// - `AuthError::InvalidCredentials` for an unknown user, a wrong
    ///   password, or an unreadable stored hash
    /// - `AppError::Database` if the store lookup fails
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AppError> {
        let stored = self.store.find_by_username(username).await?;

        let (identity, password_hash) = match stored {
            Some(stored) => (Some(stored.identity), stored.password_hash),
            None => (None, self.dummy_hash.to_string()),
        };

        let verification = verify_off_thread(password.to_string(), password_hash).await;

        let identity = match (identity, verification) {
            (Some(identity), Ok(())) => identity,
            (None, _) => {
                tracing::info!(username = %username, "Login attempt for unknown user");
                return Err(AuthError::InvalidCredentials.into());
            }
            (Some(identity), Err(AuthError::InvalidCredentials)) => {
                tracing::info!(user_id = %identity.id, "Login attempt with wrong password");
                return Err(AuthError::InvalidCredentials.into());
            }
            (Some(identity), Err(e)) => {
                tracing::error!(user_id = %identity.id, error = %e, "Stored credential could not be verified");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let pair = self.issue_pair(&identity)?;
        tracing::info!(user_id = %identity.id, "User logged in");
        Ok(pair)
    }

    /// Check an access token and return the user it belongs to.
    ///
    /// # Errors
    /// `AuthError::Unauthorized` for every kind of invalid token. The
    /// precise cause is logged, not returned.
    pub fn authorize(&self, bearer_token: &str) -> Result<Uuid, AuthError> {
        let claims = self.validate(bearer_token, TokenClass::Access)?;
        claims.user_id().map_err(|_| AuthError::Unauthorized)
    }

    /// Exchange a refresh token for a fresh pair.
    ///
    /// # Errors
    /// - `AuthError::Unauthorized` if the refresh token is invalid
    /// - `AuthError::IdentityNotFound` if the user was deleted since issuance
    /// - `AppError::Database` if the store lookup fails
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self.validate(refresh_token, TokenClass::Refresh)?;
        let user_id = claims.user_id().map_err(|_| AuthError::Unauthorized)?;

        let identity = self.store.find_by_id(user_id).await?.ok_or_else(|| {
            tracing::warn!(user_id = %user_id, "Refresh token for identity that no longer exists");
            AuthError::IdentityNotFound
        })?;

        let pair = self.issue_pair(&identity)?;
        tracing::info!(user_id = %identity.id, "Token pair refreshed");
        Ok(pair)
    }

    fn validate(&self, token: &str, class: TokenClass) -> Result<Claims, AuthError> {
        validate_token(token, self.keyring.secret(class), class, self.clock.as_ref()).map_err(|e| {
            tracing::warn!(token_class = ?class, error = %e, "Token rejected");
            AuthError::Unauthorized
        })
    }

    fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, AuthError> {
        let issue = |class: TokenClass| {
            issue_token(
                identity.id,
                &identity.username,
                class,
                self.keyring.secret(class),
                self.keyring.ttl(class),
                self.clock.as_ref(),
            )
        };

        Ok(TokenPair {
            access_token: issue(TokenClass::Access)?,
            refresh_token: issue(TokenClass::Refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.keyring.ttl(TokenClass::Access).num_seconds(),
        })
    }
}

/// bcrypt is CPU-bound; keep it off the async worker threads.
async fn verify_off_thread(password: String, password_hash: String) -> Result<(), AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| AuthError::HashingFailure(e.to_string()))?
}
