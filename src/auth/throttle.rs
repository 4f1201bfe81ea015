use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
struct AttemptWindow {
    timestamps: Vec<DateTime<Utc>>,
}

impl AttemptWindow {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    fn cleanup_old_attempts(&mut self, window_size: Duration) {
        let cutoff = Utc::now() - window_size;
        self.timestamps.retain(|ts| *ts > cutoff);
    }

    fn add_attempt(&mut self) {
        self.timestamps.push(Utc::now());
    }

    fn attempt_count(&self) -> usize {
        self.timestamps.len()
    }
}

/// Tracks failed sign-in attempts per address. Once an address has
/// `limit` failures inside the window, further attempts are refused
/// until old failures age out. Successful sign-in clears the slate.
pub struct SigninThrottle {
    windows: Arc<RwLock<HashMap<String, AttemptWindow>>>,
    limit: u32,
    window_size: Duration,
}

impl SigninThrottle {
    pub fn new(limit: u32, window_seconds: i64) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            limit,
            window_size: Duration::seconds(window_seconds),
        }
    }

    /// Whether this address may attempt a sign-in right now.
    pub async fn allow(&self, email: &str) -> bool {
        let mut windows = self.windows.write().await;
        match windows.get_mut(email) {
            Some(window) => {
                window.cleanup_old_attempts(self.window_size);
                window.attempt_count() < self.limit as usize
            }
            None => true,
        }
    }

    pub async fn record_failure(&self, email: &str) {
        let mut windows = self.windows.write().await;
        let window = windows
            .entry(email.to_string())
            .or_insert_with(AttemptWindow::new);
        window.cleanup_old_attempts(self.window_size);
        window.add_attempt();
    }

    pub async fn clear(&self, email: &str) {
        self.windows.write().await.remove(email);
    }

    /// Drops windows with no recent failures so the map does not grow
    /// without bound.
    pub async fn cleanup(&self) {
        let mut windows = self.windows.write().await;
        windows.retain(|_, window| {
            window.cleanup_old_attempts(self.window_size);
            !window.timestamps.is_empty()
        });
    }
}
