pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod mail;
pub mod pages;
pub mod templates;

use std::sync::Arc;
use actix_web::HttpResponse;
use tera::Tera;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::AuthService;
pub use db::{MemoryStorage, PgStorage, Session, Storage, User};
pub use mail::{ConsoleMailer, EmailMessage, Mailer, MemoryMailer};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub storage: Arc<dyn Storage>,
    pub auth: Arc<AuthService>,
    pub mailer: Arc<dyn Mailer>,
    pub templates: Arc<Tera>,
}

impl AppState {
    pub async fn new(settings: Settings) -> Result<Self> {
        let storage: Arc<dyn Storage> = if settings.use_memory_storage() {
            Arc::new(MemoryStorage::new())
        } else {
            let storage = PgStorage::connect(&settings.database).await?;
            storage.run_migrations().await?;
            Arc::new(storage)
        };

        let mailer: Arc<dyn Mailer> = match settings.mail.backend.as_str() {
            "memory" => Arc::new(MemoryMailer::new()),
            _ => Arc::new(ConsoleMailer),
        };

        let auth = Arc::new(AuthService::new(storage.clone(), &settings.auth));
        let templates = Arc::new(templates::build_templates()?);

        Ok(Self {
            settings: Arc::new(settings),
            storage,
            auth,
            mailer,
            templates,
        })
    }
}
