use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::{Identity, IdentityStore, StoredIdentity};
use crate::error::{AppError, DatabaseError};

/// Process-local store keyed by username
#[derive(Default)]
pub struct InMemoryIdentityStore {
    users: RwLock<HashMap<String, StoredIdentity>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user, returning whether it existed.
    pub fn remove(&self, username: &str) -> Result<bool, AppError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        Ok(users.remove(username).is_some())
    }
}

fn poisoned() -> AppError {
    AppError::Database(DatabaseError::UnexpectedError(
        "identity store lock poisoned".to_string(),
    ))
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<StoredIdentity>, AppError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users
            .values()
            .find(|stored| stored.identity.id == id)
            .map(|stored| stored.identity.clone()))
    }

    async fn insert(&self, username: &str, password_hash: &str) -> Result<Identity, AppError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users.contains_key(username) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "Username already taken".to_string(),
            )));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            username: username.to_string(),
        };
        users.insert(
            username.to_string(),
            StoredIdentity {
                identity: identity.clone(),
                password_hash: password_hash.to_string(),
            },
        );

        Ok(identity)
    }
}
