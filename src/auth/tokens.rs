//! Password-reset tokens.
//!
//! A token is `{hex timestamp}-{hex hmac}`, signed over account state
//! that changes when the token must stop working: the password hash
//! (consumed resets), last_login (any sign-in) and the active flag.
//! Nothing is stored server-side; a token is checked by recomputing the
//! signature from the account row.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::db::models::User;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct ResetTokenGenerator {
    secret: String,
    lifetime_seconds: u64,
}

impl ResetTokenGenerator {
    pub fn new(secret: impl Into<String>, lifetime_hours: i64) -> Self {
        Self {
            secret: secret.into(),
            lifetime_seconds: lifetime_hours.max(0) as u64 * 3600,
        }
    }

    pub fn make_token(&self, user: &User) -> String {
        let timestamp = Self::current_timestamp();
        let mac = self.compute_hmac(&Self::make_hash_value(user, timestamp));
        format!("{timestamp:x}-{}", hex::encode(mac))
    }

    pub fn check_token(&self, user: &User, token: &str) -> bool {
        let parts: Vec<&str> = token.splitn(2, '-').collect();
        if parts.len() != 2 {
            return false;
        }

        let Ok(timestamp) = u64::from_str_radix(parts[0], 16) else {
            return false;
        };

        if Self::current_timestamp().saturating_sub(timestamp) > self.lifetime_seconds {
            return false;
        }

        let Ok(claimed) = hex::decode(parts[1]) else {
            return false;
        };

        // Constant-time comparison via the Mac itself.
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(Self::make_hash_value(user, timestamp).as_bytes());
        mac.verify_slice(&claimed).is_ok()
    }

    fn current_timestamp() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn compute_hmac(&self, data: &str) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(data.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn make_hash_value(user: &User, timestamp: u64) -> String {
        let last_login = user
            .last_login
            .map_or_else(String::new, |dt| dt.timestamp().to_string());

        format!(
            "{}:{}:{}:{}:{}",
            user.id, user.password_hash, last_login, user.is_active, timestamp
        )
    }
}

/// Account id as it appears in reset links: URL-safe base64, no padding.
pub fn encode_uid(id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

pub fn decode_uid(encoded: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    Uuid::from_slice(&bytes).ok()
}
