use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub security: SecuritySettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: SecretString,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    /// Keep identities in process memory instead of PostgreSQL
    pub in_memory: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            username: "postgres".to_string(),
            password: SecretString::new(String::new()),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "foodgenie".to_string(),
            in_memory: false,
        }
    }
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> SecretString {
        SecretString::new(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database_name
        ))
    }
}

/// Token signing settings. Expiries are in seconds.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_token_secret: SecretString,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,
    pub refresh_token_secret: SecretString,
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64,
}

/// Password hashing and login throttling
#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SecuritySettings {
    /// bcrypt work factor
    pub hash_cost: u32,
    /// Login attempts allowed per client address per minute
    pub login_attempts_per_minute: u32,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            hash_cost: crate::auth::DEFAULT_HASH_COST,
            login_attempts_per_minute: 20,
        }
    }
}

impl SecuritySettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(4..=31).contains(&self.hash_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "security.hash_cost must be between 4 and 31, got {}",
                self.hash_cost
            )));
        }
        if self.login_attempts_per_minute == 0 {
            return Err(ConfigError::InvalidValue(
                "security.login_attempts_per_minute must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_access_token_expiry() -> i64 {
    15 * 60
}

fn default_refresh_token_expiry() -> i64 {
    7 * 24 * 60 * 60
}

/// Loads `configuration.{yaml,toml,json}` if present, then overlays
/// `APP__SECTION__KEY` environment variables.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.security.validate()?;
    Ok(settings)
}
