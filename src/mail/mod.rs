//! Outbound mail. The site only sends password-reset messages, so the
//! surface is small: a message type, a backend trait, a console
//! backend for development and an in-memory outbox for tests.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    pub from_email: String,
    pub to: Vec<String>,
}

impl EmailMessage {
    pub fn new(
        subject: impl Into<String>,
        body: impl Into<String>,
        from_email: impl Into<String>,
        to: Vec<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            from_email: from_email.into(),
            to,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), AppError>;
}

/// Writes messages to the log instead of sending them.
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), AppError> {
        info!(
            to = message.to.join(", "),
            from = message.from_email,
            subject = message.subject,
            "outgoing mail:\n{}",
            message.body
        );
        Ok(())
    }
}

/// Collects messages in memory so tests can assert on what was sent.
#[derive(Default)]
pub struct MemoryMailer {
    outbox: RwLock<Vec<EmailMessage>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn outbox(&self) -> Vec<EmailMessage> {
        self.outbox.read().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), AppError> {
        self.outbox.write().await.push(message);
        Ok(())
    }
}
