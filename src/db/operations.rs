use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::db::models::{Session, User};
use crate::error::StorageError;

/// Data access layer. Both the Postgres implementation and the
/// in-memory implementation used by the test suite go through this.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<User, StorageError>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;
    /// Persists email, name, password hash, active flag and last_login.
    /// `updated_at` is stamped here.
    async fn update_user(&self, user: &User) -> Result<User, StorageError>;

    async fn create_session(&self, session: &Session) -> Result<Session, StorageError>;
    async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>, StorageError>;
    async fn update_session_activity(&self, token: &str) -> Result<(), StorageError>;
    async fn delete_session(&self, token: &str) -> Result<(), StorageError>;
    /// Deletes every session belonging to the user except `keep_token`,
    /// when given. Returns the number of sessions removed.
    async fn delete_sessions_for_user(
        &self,
        user_id: Uuid,
        keep_token: Option<&str>,
    ) -> Result<u64, StorageError>;
    async fn cleanup_expired_sessions(&self) -> Result<u64, StorageError>;
}

pub struct PgStorage {
    pool: Arc<PgPool>,
}

impl PgStorage {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.url)
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn create_user(&self, user: &User) -> Result<User, StorageError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, password_hash, is_active, is_admin, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, email, name, password_hash, is_active, is_admin, created_at, updated_at, last_login
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.is_admin)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(created)
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, is_active, is_admin, created_at, updated_at, last_login FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, is_active, is_admin, created_at, updated_at, last_login FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<User, StorageError> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = $2, name = $3, password_hash = $4, is_active = $5,
                last_login = $6, updated_at = $7
            WHERE id = $1
            RETURNING id, email, name, password_hash, is_active, is_admin, created_at, updated_at, last_login
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.last_login)
        .bind(Utc::now())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(updated)
    }

    async fn create_session(&self, session: &Session) -> Result<Session, StorageError> {
        let created = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, token, expires_at, created_at, last_activity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, token, expires_at, created_at, last_activity
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.last_activity)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(created)
    }

    async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>, StorageError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, token, expires_at, created_at, last_activity FROM sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    async fn update_session_activity(&self, token: &str) -> Result<(), StorageError> {
        sqlx::query("UPDATE sessions SET last_activity = $1 WHERE token = $2")
            .bind(Utc::now())
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn delete_session(&self, token: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn delete_sessions_for_user(
        &self,
        user_id: Uuid,
        keep_token: Option<&str>,
    ) -> Result<u64, StorageError> {
        let result = match keep_token {
            Some(token) => {
                sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND token <> $2")
                    .bind(user_id)
                    .bind(token)
                    .execute(self.pool.as_ref())
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM sessions WHERE user_id = $1")
                    .bind(user_id)
                    .execute(self.pool.as_ref())
                    .await?
            }
        };

        Ok(result.rows_affected())
    }

    async fn cleanup_expired_sessions(&self) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }
}
