use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use tracing::{debug, info};

use crate::auth::password::{hash_password, normalize_email, verify_password};
use crate::auth::throttle::SigninThrottle;
use crate::auth::tokens::{decode_uid, ResetTokenGenerator};
use crate::config::AuthConfig;
use crate::db::models::{Session, User};
use crate::db::operations::Storage;
use crate::error::{AppError, AuthError};

/// Account operations: registration, sign-in, sessions, password
/// change and reset. Pages never touch [`Storage`] directly for
/// account state; they go through this service.
pub struct AuthService {
    storage: Arc<dyn Storage>,
    throttle: SigninThrottle,
    reset_tokens: ResetTokenGenerator,
    session_ttl_hours: i64,
}

impl AuthService {
    pub fn new(storage: Arc<dyn Storage>, config: &AuthConfig) -> Self {
        Self {
            storage,
            throttle: SigninThrottle::new(
                config.signin_attempt_limit,
                config.signin_window_seconds,
            ),
            reset_tokens: ResetTokenGenerator::new(
                config.secret_key.clone(),
                config.reset_token_ttl_hours,
            ),
            session_ttl_hours: config.session_ttl_hours,
        }
    }

    /// Creates an account and signs it straight in.
    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<(User, Session), AppError> {
        let email = normalize_email(email);
        let password_hash = hash_password(password).await?;
        let user = User::new(email, name.to_string(), password_hash);

        let created = self.storage.create_user(&user).await?;
        info!(user_id = %created.id, "account created");

        self.start_session(created).await
    }

    /// Verifies credentials and opens a session. Unknown addresses,
    /// wrong passwords and deactivated accounts all come back as
    /// [`AuthError::InvalidCredentials`].
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, Session), AppError> {
        let email = normalize_email(email);

        if !self.throttle.allow(&email).await {
            debug!("sign-in throttled");
            return Err(AuthError::Throttled.into());
        }

        let user = match self.storage.get_user_by_email(&email).await? {
            Some(user) if user.is_active => user,
            _ => {
                // Burn a hash so unknown addresses cost the same as
                // wrong passwords.
                hash_password(password).await.ok();
                self.throttle.record_failure(&email).await;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !verify_password(password, &user.password_hash).await? {
            self.throttle.record_failure(&email).await;
            return Err(AuthError::InvalidCredentials.into());
        }

        self.throttle.clear(&email).await;
        self.start_session(user).await
    }

    /// Looks up the account behind a session cookie. `None` means the
    /// visitor is anonymous: no session, an expired one, or an account
    /// that no longer signs in.
    pub async fn resolve_session(&self, token: &str) -> Result<Option<User>, AppError> {
        let Some(session) = self.storage.get_session_by_token(token).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            self.storage.delete_session(token).await?;
            return Ok(None);
        }

        match self.storage.get_user_by_id(session.user_id).await? {
            Some(user) if user.is_active => {
                self.storage.update_session_activity(token).await?;
                Ok(Some(user))
            }
            _ => {
                self.storage.delete_session(token).await?;
                Ok(None)
            }
        }
    }

    pub async fn sign_out(&self, token: &str) -> Result<(), AppError> {
        self.storage.delete_session(token).await?;
        Ok(())
    }

    /// Changes the password after checking the old one. Every other
    /// session of the account is revoked; the current one stays open.
    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
        current_token: &str,
    ) -> Result<User, AppError> {
        if !verify_password(old_password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let mut updated = user.clone();
        updated.password_hash = hash_password(new_password).await?;
        let updated = self.storage.update_user(&updated).await?;

        let revoked = self
            .storage
            .delete_sessions_for_user(updated.id, Some(current_token))
            .await?;
        info!(user_id = %updated.id, revoked, "password changed");

        Ok(updated)
    }

    /// Updates email and name. The address is normalized first; a
    /// collision with another account surfaces as a duplicate error.
    pub async fn update_profile(
        &self,
        user: &User,
        email: &str,
        name: &str,
    ) -> Result<User, AppError> {
        let mut updated = user.clone();
        updated.email = normalize_email(email);
        updated.name = name.to_string();
        Ok(self.storage.update_user(&updated).await?)
    }

    /// First half of the reset flow. Returns the account with the
    /// encoded id and token to put in the email, or `None` when no
    /// active account matches — callers render the same page either
    /// way so addresses cannot be probed.
    pub async fn start_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<(User, String, String)>, AppError> {
        let email = normalize_email(email);
        let Some(user) = self.storage.get_user_by_email(&email).await? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let uid = crate::auth::tokens::encode_uid(user.id);
        let token = self.reset_tokens.make_token(&user);
        Ok(Some((user, uid, token)))
    }

    /// Checks a reset link without consuming it.
    pub async fn verify_reset_link(
        &self,
        uidb64: &str,
        token: &str,
    ) -> Result<Option<User>, AppError> {
        let Some(id) = decode_uid(uidb64) else {
            return Ok(None);
        };
        let Some(user) = self.storage.get_user_by_id(id).await? else {
            return Ok(None);
        };
        if !user.is_active || !self.reset_tokens.check_token(&user, token) {
            return Ok(None);
        }
        Ok(Some(user))
    }

    /// Second half of the reset flow: sets the new password and
    /// revokes every session. The token stops working here because
    /// the hash it was signed over changes.
    pub async fn complete_password_reset(
        &self,
        uidb64: &str,
        token: &str,
        new_password: &str,
    ) -> Result<User, AppError> {
        let Some(user) = self.verify_reset_link(uidb64, token).await? else {
            return Err(AuthError::InvalidResetToken.into());
        };

        let mut updated = user.clone();
        updated.password_hash = hash_password(new_password).await?;
        let updated = self.storage.update_user(&updated).await?;

        self.storage
            .delete_sessions_for_user(updated.id, None)
            .await?;
        info!(user_id = %updated.id, "password reset completed");

        Ok(updated)
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AppError> {
        let removed = self.storage.cleanup_expired_sessions().await?;
        self.throttle.cleanup().await;
        Ok(removed)
    }

    /// Stamps `last_login` and opens a fresh session.
    async fn start_session(&self, user: User) -> Result<(User, Session), AppError> {
        let mut user = user;
        user.last_login = Some(Utc::now());
        let user = self.storage.update_user(&user).await?;

        let session = Session::new(user.id, generate_session_token(), self.session_ttl_hours);
        let session = self.storage.create_session(&session).await?;
        debug!(user_id = %user.id, "session opened");

        Ok((user, session))
    }
}

/// Opaque session token: 32 random bytes, URL-safe base64.
fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStorage;

    fn test_config() -> AuthConfig {
        AuthConfig {
            secret_key: "test_secret".to_string(),
            session_ttl_hours: 1,
            reset_token_ttl_hours: 72,
            signin_attempt_limit: 3,
            signin_window_seconds: 300,
        }
    }

    fn service() -> (AuthService, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let service = AuthService::new(storage.clone(), &test_config());
        (service, storage)
    }

    #[tokio::test]
    async fn test_register_normalizes_email_and_signs_in() {
        let (service, _) = service();
        let (user, session) = service
            .register("New@EXAMPLE.COM", "New User", "password123")
            .await
            .unwrap();

        assert_eq!(user.email, "New@example.com");
        assert!(user.last_login.is_some());

        let resolved = service.resolve_session(&session.token).await.unwrap();
        assert_eq!(resolved.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let (service, _) = service();
        service
            .register("dup@example.com", "First", "password123")
            .await
            .unwrap();

        let result = service
            .register("dup@example.com", "Second", "password456")
            .await;
        assert!(matches!(
            result,
            Err(AppError::StorageError(
                crate::error::StorageError::Duplicate
            ))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_bad_credentials() {
        let (service, _) = service();
        service
            .register("who@example.com", "Who", "password123")
            .await
            .unwrap();

        let wrong = service.authenticate("who@example.com", "wrong-pass").await;
        assert!(matches!(
            wrong,
            Err(AppError::AuthError(AuthError::InvalidCredentials))
        ));

        let unknown = service.authenticate("nobody@example.com", "password123").await;
        assert!(matches!(
            unknown,
            Err(AppError::AuthError(AuthError::InvalidCredentials))
        ));

        let ok = service.authenticate("who@example.com", "password123").await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_deactivated_account_cannot_sign_in() {
        let (service, storage) = service();
        let (user, _) = service
            .register("gone@example.com", "Gone", "password123")
            .await
            .unwrap();

        let mut deactivated = user.clone();
        deactivated.is_active = false;
        storage.update_user(&deactivated).await.unwrap();

        let result = service.authenticate("gone@example.com", "password123").await;
        assert!(matches!(
            result,
            Err(AppError::AuthError(AuthError::InvalidCredentials))
        ));
    }

    #[tokio::test]
    async fn test_throttle_locks_out_after_failures() {
        let (service, _) = service();
        service
            .register("locked@example.com", "Locked", "password123")
            .await
            .unwrap();

        for _ in 0..3 {
            let result = service.authenticate("locked@example.com", "bad").await;
            assert!(matches!(
                result,
                Err(AppError::AuthError(AuthError::InvalidCredentials))
            ));
        }

        // Correct password no longer helps until the window passes.
        let result = service
            .authenticate("locked@example.com", "password123")
            .await;
        assert!(matches!(
            result,
            Err(AppError::AuthError(AuthError::Throttled))
        ));
    }

    #[tokio::test]
    async fn test_resolve_session_handles_expiry() {
        let (service, storage) = service();
        let (user, _) = service
            .register("stale@example.com", "Stale", "password123")
            .await
            .unwrap();

        let expired = Session::new(user.id, "stale-token".to_string(), -1);
        storage.create_session(&expired).await.unwrap();

        let resolved = service.resolve_session("stale-token").await.unwrap();
        assert!(resolved.is_none());
        // The dead session is gone now.
        assert!(storage
            .get_session_by_token("stale-token")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sign_out_revokes_session() {
        let (service, _) = service();
        let (_, session) = service
            .register("out@example.com", "Out", "password123")
            .await
            .unwrap();

        service.sign_out(&session.token).await.unwrap();
        assert!(service
            .resolve_session(&session.token)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_change_password_keeps_current_session() {
        let (service, _) = service();
        let (user, first) = service
            .register("chg@example.com", "Chg", "password123")
            .await
            .unwrap();
        let (_, second) = service
            .authenticate("chg@example.com", "password123")
            .await
            .unwrap();

        let wrong_old = service
            .change_password(&user, "not-the-old-one", "newpassword1", &second.token)
            .await;
        assert!(matches!(
            wrong_old,
            Err(AppError::AuthError(AuthError::InvalidCredentials))
        ));

        service
            .change_password(&user, "password123", "newpassword1", &second.token)
            .await
            .unwrap();

        assert!(service.resolve_session(&first.token).await.unwrap().is_none());
        assert!(service
            .resolve_session(&second.token)
            .await
            .unwrap()
            .is_some());
        assert!(service
            .authenticate("chg@example.com", "newpassword1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_update_profile_normalizes_and_rejects_taken_email() {
        let (service, _) = service();
        let (user, _) = service
            .register("me@example.com", "Me", "password123")
            .await
            .unwrap();
        service
            .register("taken@example.com", "Other", "password123")
            .await
            .unwrap();

        let updated = service
            .update_profile(&user, "Me@NEW.example.COM", "Renamed")
            .await
            .unwrap();
        assert_eq!(updated.email, "Me@new.example.com");
        assert_eq!(updated.name, "Renamed");

        let clash = service
            .update_profile(&updated, "taken@example.com", "Renamed")
            .await;
        assert!(matches!(
            clash,
            Err(AppError::StorageError(
                crate::error::StorageError::Duplicate
            ))
        ));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let (service, _) = service();
        let (user, session) = service
            .register("reset@example.com", "Reset", "password123")
            .await
            .unwrap();

        let (found, uid, token) = service
            .start_password_reset("Reset@EXAMPLE.com")
            .await
            .unwrap()
            .expect("active account should get a reset token");
        assert_eq!(found.id, user.id);

        assert!(service.verify_reset_link(&uid, &token).await.unwrap().is_some());
        assert!(service
            .verify_reset_link(&uid, "bogus-token")
            .await
            .unwrap()
            .is_none());

        service
            .complete_password_reset(&uid, &token, "brandnewpass1")
            .await
            .unwrap();

        // Every session is revoked and the link is spent.
        assert!(service
            .resolve_session(&session.token)
            .await
            .unwrap()
            .is_none());
        assert!(service.verify_reset_link(&uid, &token).await.unwrap().is_none());

        let reuse = service
            .complete_password_reset(&uid, &token, "anotherpass1")
            .await;
        assert!(matches!(
            reuse,
            Err(AppError::AuthError(AuthError::InvalidResetToken))
        ));

        assert!(service
            .authenticate("reset@example.com", "brandnewpass1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_password_reset_unknown_address_is_silent() {
        let (service, _) = service();
        let result = service
            .start_password_reset("nobody@example.com")
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
