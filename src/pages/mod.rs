//! Server-rendered pages and the access rules in front of them.
//!
//! Every page handler follows the same shape: resolve the visitor from
//! the session cookie, run the page's policy chain through [`enforce`],
//! then do the page's own work. Redirect targets live in [`routes`] so
//! policies and links cannot drift apart.

pub mod forms;
pub mod site;
pub mod users;

use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header::{ContentType, LOCATION};
use actix_web::{web, HttpRequest, HttpResponse};
use tera::Context;

use crate::db::models::User;
use crate::error::AppError;
use crate::gate::{self, AccessPolicy, AccountId, Decision, Target, Visitor};
use crate::AppState;

/// Canonical paths.
pub mod routes {
    use uuid::Uuid;

    pub const TOP: &str = "/";
    pub const HOME: &str = "/home/";
    pub const SIGNIN: &str = "/users/signin/";
    pub const SIGNOUT: &str = "/users/signout/";
    pub const SIGNUP: &str = "/users/signup/";
    pub const WELCOME: &str = "/users/welcome/";
    pub const CHANGE_PASSWORD: &str = "/users/change_password/";
    pub const CHANGE_PASSWORD_DONE: &str = "/users/change_password_done/";
    pub const PASSWORD_RESET: &str = "/users/password_reset/";
    pub const PASSWORD_RESET_DONE: &str = "/users/password_reset_done/";
    pub const PASSWORD_RESET_COMPLETE: &str = "/users/password_reset_complete/";
    pub const HEALTH: &str = "/health";

    pub fn profile(id: Uuid) -> String {
        format!("/users/profile/{id}")
    }

    pub fn password_reset_confirm(uidb64: &str, token: &str) -> String {
        format!("/users/password_reset_confirm/{uidb64}/{token}/")
    }
}

pub const SESSION_COOKIE: &str = "sessionid";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route(routes::TOP, web::get().to(site::top_page))
        .route(routes::HOME, web::get().to(site::home))
        .route(routes::SIGNIN, web::get().to(users::signin_page))
        .route(routes::SIGNIN, web::post().to(users::signin_submit))
        .route(routes::SIGNOUT, web::post().to(users::signout))
        .route(routes::SIGNUP, web::get().to(users::signup_page))
        .route(routes::SIGNUP, web::post().to(users::signup_submit))
        .route(routes::WELCOME, web::get().to(users::welcome))
        .route(routes::CHANGE_PASSWORD, web::get().to(users::change_password_page))
        .route(routes::CHANGE_PASSWORD, web::post().to(users::change_password_submit))
        .route(
            routes::CHANGE_PASSWORD_DONE,
            web::get().to(users::change_password_done),
        )
        .route(routes::PASSWORD_RESET, web::get().to(users::password_reset_page))
        .route(routes::PASSWORD_RESET, web::post().to(users::password_reset_submit))
        .route(
            routes::PASSWORD_RESET_DONE,
            web::get().to(users::password_reset_done),
        )
        .route(
            "/users/password_reset_confirm/{uidb64}/{token}/",
            web::get().to(users::password_reset_confirm_page),
        )
        .route(
            "/users/password_reset_confirm/{uidb64}/{token}/",
            web::post().to(users::password_reset_confirm_submit),
        )
        .route(
            routes::PASSWORD_RESET_COMPLETE,
            web::get().to(users::password_reset_complete),
        )
        .route("/users/profile/{id}", web::get().to(users::profile_page))
        .route("/users/profile/{id}", web::post().to(users::profile_submit))
        .route(routes::HEALTH, web::get().to(crate::health_check))
        .default_service(web::route().to(not_found));
}

/// Unknown paths render the same page as a denied profile probe, so a
/// 404 never reveals whether the path exists.
async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound)
}

/// Resolves the account behind the request's session cookie, if any.
pub async fn current_user(
    req: &HttpRequest,
    state: &AppState,
) -> Result<Option<User>, AppError> {
    let Some(cookie) = req.cookie(SESSION_COOKIE) else {
        return Ok(None);
    };
    state.auth.resolve_session(cookie.value()).await
}

pub fn visitor_for(user: Option<&User>) -> Visitor {
    match user {
        Some(user) => Visitor::signed_in(AccountId::new(user.id)),
        None => Visitor::anonymous(),
    }
}

/// Runs a policy chain and translates the decision for HTTP.
///
/// `Ok(None)` means the page may proceed. A redirect towards sign-in
/// carries the original path in `?next=` so the visitor lands back
/// where they were headed.
pub fn enforce(
    policies: &[AccessPolicy],
    visitor: &Visitor,
    target: Option<&Target>,
    request_path: &str,
) -> Result<Option<HttpResponse>, AppError> {
    match gate::evaluate(policies, visitor, target) {
        Decision::Allow => Ok(None),
        Decision::DenyRedirect(destination) => {
            let location = if destination == routes::SIGNIN {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("next", request_path)
                    .finish();
                format!("{destination}?{query}")
            } else {
                destination.to_string()
            };
            Ok(Some(found(&location)))
        }
        Decision::DenyNotFound => Err(AppError::NotFound),
    }
}

pub fn base_context(state: &AppState, user: Option<&User>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("site_name", &state.settings.site.name);
    ctx.insert("current_user", &user);
    ctx
}

pub fn render(state: &AppState, template: &str, ctx: &Context) -> Result<HttpResponse, AppError> {
    let body = state.templates.render(template, ctx)?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(body))
}

pub fn found(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, location))
        .finish()
}

pub fn session_cookie(state: &AppState, token: &str) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.settings.environment == "production")
        .max_age(CookieDuration::hours(state.settings.auth.session_ttl_hours))
        .finish()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::ZERO)
        .finish()
}

/// Accepts a post-sign-in destination only when it stays on this site:
/// an absolute path, but not a scheme-relative `//host` URL.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//"))
}
