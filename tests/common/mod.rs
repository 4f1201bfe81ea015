#![allow(dead_code)]

use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::{test, web};

use portal_server::pages::SESSION_COOKIE;
use portal_server::templates::build_templates;
use portal_server::{
    AppState, AuthService, MemoryMailer, MemoryStorage, Session, Settings, User,
};

/// In-memory application state plus direct handles on the storage and
/// mail backends, so tests can look behind the HTTP surface.
pub struct TestContext {
    pub state: web::Data<AppState>,
    pub storage: Arc<MemoryStorage>,
    pub mailer: Arc<MemoryMailer>,
}

pub async fn test_state() -> TestContext {
    let settings = Settings::new_for_test().expect("Failed to load test config");
    let storage = Arc::new(MemoryStorage::new());
    let mailer = Arc::new(MemoryMailer::new());

    let auth = Arc::new(AuthService::new(storage.clone(), &settings.auth));
    let templates = Arc::new(build_templates().expect("Failed to build templates"));

    let state = AppState {
        settings: Arc::new(settings),
        storage: storage.clone(),
        auth,
        mailer: mailer.clone(),
        templates,
    };

    TestContext {
        state: web::Data::new(state),
        storage,
        mailer,
    }
}

/// Registers an account through the auth service. Registration signs the
/// new account in, so the opened session comes back too.
pub async fn create_account(
    ctx: &TestContext,
    email: &str,
    name: &str,
    password: &str,
) -> (User, Session) {
    ctx.state
        .auth
        .register(email, name, password)
        .await
        .expect("registration should succeed")
}

pub fn cookie_for(session: &Session) -> Cookie<'static> {
    Cookie::new(SESSION_COOKIE, session.token.clone())
}

pub fn location<B>(resp: &ServiceResponse<B>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub async fn body_text<B: MessageBody>(resp: ServiceResponse<B>) -> String {
    let bytes = test::read_body(resp).await;
    String::from_utf8_lossy(&bytes).to_string()
}
