use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{Session, User};
use crate::db::operations::Storage;
use crate::error::StorageError;

/// In-memory storage backend. Used by the test suite and by
/// `database.backend = "memory"` deployments; data does not survive a
/// restart.
#[derive(Default)]
pub struct MemoryStorage {
    users: RwLock<HashMap<Uuid, User>>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_user(&self, user: &User) -> Result<User, StorageError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StorageError::Duplicate);
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<User, StorageError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StorageError::Duplicate);
        }
        let stored = users.get_mut(&user.id).ok_or(StorageError::NotFound)?;
        stored.email = user.email.clone();
        stored.name = user.name.clone();
        stored.password_hash = user.password_hash.clone();
        stored.is_active = user.is_active;
        stored.last_login = user.last_login;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn create_session(&self, session: &Session) -> Result<Session, StorageError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.token) {
            return Err(StorageError::Duplicate);
        }
        sessions.insert(session.token.clone(), session.clone());
        Ok(session.clone())
    }

    async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>, StorageError> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn update_session_activity(&self, token: &str) -> Result<(), StorageError> {
        if let Some(session) = self.sessions.write().await.get_mut(token) {
            session.last_activity = Utc::now();
        }
        Ok(())
    }

    async fn delete_session(&self, token: &str) -> Result<(), StorageError> {
        self.sessions.write().await.remove(token);
        Ok(())
    }

    async fn delete_sessions_for_user(
        &self,
        user_id: Uuid,
        keep_token: Option<&str>,
    ) -> Result<u64, StorageError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|token, session| {
            session.user_id != user_id || keep_token == Some(token.as_str())
        });
        Ok((before - sessions.len()) as u64)
    }

    async fn cleanup_expired_sessions(&self) -> Result<u64, StorageError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        Ok((before - sessions.len()) as u64)
    }
}
