/// Identity store
///
/// The user records the authentication flows read from: an id, a username
/// and a bcrypt credential hash. PostgreSQL in production, a map in tests.

mod memory;
mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

pub use memory::InMemoryIdentityStore;
pub use postgres::PgIdentityStore;

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
}

/// An identity together with its stored credential hash.
#[derive(Debug, Clone)]
pub struct StoredIdentity {
    pub identity: Identity,
    pub password_hash: String,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<StoredIdentity>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError>;

    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` if the username is taken
    async fn insert(&self, username: &str, password_hash: &str) -> Result<Identity, AppError>;
}
