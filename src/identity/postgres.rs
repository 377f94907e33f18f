use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Identity, IdentityStore, StoredIdentity};
use crate::error::AppError;

/// `users` table backed store
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<StoredIdentity>, AppError> {
        let row = sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, username, password_hash)| StoredIdentity {
            identity: Identity { id, username },
            password_hash,
        }))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query_as::<_, (Uuid, String)>("SELECT id, username FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id, username)| Identity { id, username }))
    }

    async fn insert(&self, username: &str, password_hash: &str) -> Result<Identity, AppError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(Identity {
            id,
            username: username.to_string(),
        })
    }
}
