use std::net::TcpListener;
use std::sync::Arc;

use foodgenie::auth::{SecretKeyring, SessionManager};
use foodgenie::configuration::get_configuration;
use foodgenie::identity::{IdentityStore, InMemoryIdentityStore, PgIdentityStore};
use foodgenie::startup::run;
use foodgenie::telemetry::init_telemetry;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;

fn startup_error(kind: std::io::ErrorKind, message: &str) -> std::io::Error {
    std::io::Error::new(kind, message.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    // Signing keys are fixed for the lifetime of the process
    let keyring = SecretKeyring::from_settings(&configuration.jwt).map_err(|e| {
        tracing::error!("Invalid JWT configuration: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "JWT configuration error")
    })?;

    let store: Arc<dyn IdentityStore> = if configuration.database.in_memory {
        tracing::warn!("Using in-memory identity store; users are lost on restart");
        Arc::new(InMemoryIdentityStore::new())
    } else {
        tracing::info!("Attempting to connect to database");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(configuration.database.connection_string().expose_secret())
            .await
            .map_err(|e| {
                tracing::error!("Failed to create connection pool: {}", e);
                startup_error(std::io::ErrorKind::ConnectionRefused, "Database connection error")
            })?;
        tracing::info!("Database connection pool created successfully");

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            startup_error(std::io::ErrorKind::Other, "Database migration error")
        })?;
        Arc::new(PgIdentityStore::new(pool))
    };

    let sessions = SessionManager::new(Arc::new(keyring), store, configuration.security.hash_cost)
        .map_err(|e| {
            tracing::error!("Failed to initialise session manager: {}", e);
            startup_error(std::io::ErrorKind::Other, "Session manager error")
        })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, sessions, configuration.security)?;
    server.await
}
