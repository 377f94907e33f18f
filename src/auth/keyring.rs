/// Secret Keyring
///
/// The two signing secrets and token lifetimes, built once at startup and
/// shared read-only afterwards. Access and refresh tokens must be signed with
/// different key material, so construction fails if the secrets match.

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};

use crate::auth::TokenClass;
use crate::configuration::JwtSettings;
use crate::error::ConfigError;

#[derive(Debug)]
pub struct SecretKeyring {
    access_secret: SecretString,
    access_ttl: Duration,
    refresh_secret: SecretString,
    refresh_ttl: Duration,
}

impl SecretKeyring {
    /// # Errors
    /// Returns `ConfigError` if a secret is empty, both secrets are equal,
    /// or a lifetime is not strictly positive.
    pub fn new(
        access_secret: SecretString,
        access_ttl: Duration,
        refresh_secret: SecretString,
        refresh_ttl: Duration,
    ) -> Result<Self, ConfigError> {
        if access_secret.expose_secret().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.access_token_secret".to_string()));
        }
        if refresh_secret.expose_secret().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.refresh_token_secret".to_string()));
        }
        if access_secret.expose_secret() == refresh_secret.expose_secret() {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_secret and jwt.refresh_token_secret must differ".to_string(),
            ));
        }
        if access_ttl <= Duration::zero() {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_expiry must be positive".to_string(),
            ));
        }
        if refresh_ttl <= Duration::zero() {
            return Err(ConfigError::InvalidValue(
                "jwt.refresh_token_expiry must be positive".to_string(),
            ));
        }

        Ok(Self {
            access_secret,
            access_ttl,
            refresh_secret,
            refresh_ttl,
        })
    }

    /// Build the keyring from the `jwt` configuration section.
    pub fn from_settings(settings: &JwtSettings) -> Result<Self, ConfigError> {
        let access_ttl = seconds(settings.access_token_expiry, "jwt.access_token_expiry")?;
        let refresh_ttl = seconds(settings.refresh_token_expiry, "jwt.refresh_token_expiry")?;

        Self::new(
            settings.access_token_secret.clone(),
            access_ttl,
            settings.refresh_token_secret.clone(),
            refresh_ttl,
        )
    }

    pub fn secret(&self, class: TokenClass) -> &SecretString {
        match class {
            TokenClass::Access => &self.access_secret,
            TokenClass::Refresh => &self.refresh_secret,
        }
    }

    pub fn ttl(&self, class: TokenClass) -> Duration {
        match class {
            TokenClass::Access => self.access_ttl,
            TokenClass::Refresh => self.refresh_ttl,
        }
    }
}

fn seconds(value: i64, key: &str) -> Result<Duration, ConfigError> {
    Duration::try_seconds(value)
        .ok_or_else(|| ConfigError::InvalidValue(format!("{} is out of range", key)))
}
