//! Account pages: sign-in and sign-out, registration, password change,
//! password reset and the profile editor.

use actix_web::http::header::LOCATION;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tera::Context;
use tracing::info;
use uuid::Uuid;

use crate::db::models::User;
use crate::error::{AppError, AuthError, StorageError};
use crate::gate::{AccessPolicy, AccountId, Target};
use crate::mail::EmailMessage;
use crate::pages::forms::{
    add_error, has_errors, ChangePasswordForm, FormErrors, ProfileForm, ResetPasswordForm,
    SetPasswordForm, SigninForm, SignupForm, NON_FIELD,
};
use crate::pages::{
    base_context, clear_session_cookie, current_user, enforce, found, render, routes, safe_next,
    session_cookie, visitor_for, SESSION_COOKIE,
};
use crate::AppState;

const SIGNIN_GATE: &[AccessPolicy] = &[AccessPolicy::unauthenticated_only(routes::HOME)];
const SIGNUP_GATE: &[AccessPolicy] = &[AccessPolicy::unauthenticated_only(routes::HOME)];
const WELCOME_GATE: &[AccessPolicy] = &[AccessPolicy::authenticated_only(routes::SIGNIN)];
const CHANGE_PASSWORD_GATE: &[AccessPolicy] =
    &[AccessPolicy::authenticated_only(routes::SIGNIN)];
const PROFILE_GATE: &[AccessPolicy] = &[AccessPolicy::owner_only()];

const INVALID_LOGIN: &str =
    "Please enter a correct email address and password. Note that both fields may be case-sensitive.";
const THROTTLED: &str = "Too many sign-in attempts. Please try again later.";
const WRONG_OLD_PASSWORD: &str =
    "Your old password was entered incorrectly. Please enter it again.";
const DUPLICATE_EMAIL: &str = "A user with that email address already exists.";

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    saved: Option<String>,
}

/// The gates above guarantee an account is present; losing it between
/// the gate and here would be a bug, not a user error.
fn require_account(user: Option<User>) -> Result<User, AppError> {
    user.ok_or_else(|| {
        AppError::InternalError("signed-in visitor has no account record".to_string())
    })
}

// ---------------------------------------------------------------- sign-in

fn render_signin(
    state: &AppState,
    user: Option<&User>,
    form: &SigninForm,
    errors: &FormErrors,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(state, user);
    ctx.insert("values", form);
    ctx.insert("errors", errors);
    ctx.insert("next", &safe_next(form.next.as_deref()));
    render(state, "signin.html", &ctx)
}

pub async fn signin_page(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<NextQuery>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let visitor = visitor_for(user.as_ref());
    if let Some(response) = enforce(SIGNIN_GATE, &visitor, None, req.path())? {
        return Ok(response);
    }

    let form = SigninForm {
        next: query.into_inner().next,
        ..SigninForm::default()
    };
    render_signin(&state, user.as_ref(), &form, &SigninForm::empty_errors())
}

pub async fn signin_submit(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<SigninForm>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let visitor = visitor_for(user.as_ref());
    if let Some(response) = enforce(SIGNIN_GATE, &visitor, None, req.path())? {
        return Ok(response);
    }

    let form = form.into_inner();
    let mut errors = form.validate();
    if has_errors(&errors) {
        return render_signin(&state, user.as_ref(), &form, &errors);
    }

    match state.auth.authenticate(&form.username, &form.password).await {
        Ok((account, session)) => {
            info!(user_id = %account.id, "signed in");
            let destination = safe_next(form.next.as_deref()).unwrap_or(routes::HOME);
            Ok(HttpResponse::Found()
                .insert_header((LOCATION, destination))
                .cookie(session_cookie(&state, &session.token))
                .finish())
        }
        Err(AppError::AuthError(AuthError::InvalidCredentials)) => {
            add_error(&mut errors, NON_FIELD, INVALID_LOGIN);
            render_signin(&state, user.as_ref(), &form, &errors)
        }
        Err(AppError::AuthError(AuthError::Throttled)) => {
            add_error(&mut errors, NON_FIELD, THROTTLED);
            render_signin(&state, user.as_ref(), &form, &errors)
        }
        Err(e) => Err(e),
    }
}

pub async fn signout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        state.auth.sign_out(cookie.value()).await?;
    }

    Ok(HttpResponse::Found()
        .insert_header((LOCATION, routes::TOP))
        .cookie(clear_session_cookie())
        .finish())
}

// ---------------------------------------------------------------- sign-up

fn render_signup(
    state: &AppState,
    user: Option<&User>,
    form: &SignupForm,
    errors: &FormErrors,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(state, user);
    ctx.insert("values", form);
    ctx.insert("errors", errors);
    render(state, "signup.html", &ctx)
}

pub async fn signup_page(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let visitor = visitor_for(user.as_ref());
    if let Some(response) = enforce(SIGNUP_GATE, &visitor, None, req.path())? {
        return Ok(response);
    }

    render_signup(
        &state,
        user.as_ref(),
        &SignupForm::default(),
        &SignupForm::empty_errors(),
    )
}

pub async fn signup_submit(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<SignupForm>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let visitor = visitor_for(user.as_ref());
    if let Some(response) = enforce(SIGNUP_GATE, &visitor, None, req.path())? {
        return Ok(response);
    }

    let form = form.into_inner();
    let mut errors = form.validate();
    if has_errors(&errors) {
        return render_signup(&state, user.as_ref(), &form, &errors);
    }

    match state
        .auth
        .register(&form.email, &form.name, &form.password1)
        .await
    {
        Ok((account, session)) => {
            info!(user_id = %account.id, "account registered");
            Ok(HttpResponse::Found()
                .insert_header((LOCATION, routes::WELCOME))
                .cookie(session_cookie(&state, &session.token))
                .finish())
        }
        Err(AppError::StorageError(StorageError::Duplicate)) => {
            add_error(&mut errors, "email", DUPLICATE_EMAIL);
            render_signup(&state, user.as_ref(), &form, &errors)
        }
        Err(e) => Err(e),
    }
}

pub async fn welcome(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let visitor = visitor_for(user.as_ref());
    if let Some(response) = enforce(WELCOME_GATE, &visitor, None, req.path())? {
        return Ok(response);
    }

    let ctx = base_context(&state, user.as_ref());
    render(&state, "welcome.html", &ctx)
}

// -------------------------------------------------------- password change

fn render_change_password(
    state: &AppState,
    user: Option<&User>,
    errors: &FormErrors,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(state, user);
    ctx.insert("errors", errors);
    render(state, "password_change.html", &ctx)
}

pub async fn change_password_page(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let visitor = visitor_for(user.as_ref());
    if let Some(response) = enforce(CHANGE_PASSWORD_GATE, &visitor, None, req.path())? {
        return Ok(response);
    }

    render_change_password(&state, user.as_ref(), &ChangePasswordForm::empty_errors())
}

pub async fn change_password_submit(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<ChangePasswordForm>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let visitor = visitor_for(user.as_ref());
    if let Some(response) = enforce(CHANGE_PASSWORD_GATE, &visitor, None, req.path())? {
        return Ok(response);
    }
    let account = require_account(user)?;

    let form = form.into_inner();
    let mut errors = form.validate();
    if has_errors(&errors) {
        return render_change_password(&state, Some(&account), &errors);
    }

    let current_token = req
        .cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_default();

    match state
        .auth
        .change_password(
            &account,
            &form.old_password,
            &form.new_password1,
            &current_token,
        )
        .await
    {
        Ok(_) => Ok(found(routes::CHANGE_PASSWORD_DONE)),
        Err(AppError::AuthError(AuthError::InvalidCredentials)) => {
            add_error(&mut errors, "old_password", WRONG_OLD_PASSWORD);
            render_change_password(&state, Some(&account), &errors)
        }
        Err(e) => Err(e),
    }
}

pub async fn change_password_done(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let visitor = visitor_for(user.as_ref());
    if let Some(response) = enforce(CHANGE_PASSWORD_GATE, &visitor, None, req.path())? {
        return Ok(response);
    }

    let ctx = base_context(&state, user.as_ref());
    render(&state, "password_change_done.html", &ctx)
}

// --------------------------------------------------------- password reset

fn render_password_reset(
    state: &AppState,
    user: Option<&User>,
    form: &ResetPasswordForm,
    errors: &FormErrors,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(state, user);
    ctx.insert("values", form);
    ctx.insert("errors", errors);
    render(state, "password_reset_form.html", &ctx)
}

pub async fn password_reset_page(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    render_password_reset(
        &state,
        user.as_ref(),
        &ResetPasswordForm::default(),
        &ResetPasswordForm::empty_errors(),
    )
}

pub async fn password_reset_submit(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<ResetPasswordForm>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;

    let form = form.into_inner();
    let errors = form.validate();
    if has_errors(&errors) {
        return render_password_reset(&state, user.as_ref(), &form, &errors);
    }

    // The done page renders whether or not the address matched, so the
    // form cannot be used to probe for accounts.
    if let Some((account, uid, token)) = state.auth.start_password_reset(&form.email).await? {
        let reset_url = format!(
            "{}{}",
            state.settings.site.base_url.trim_end_matches('/'),
            routes::password_reset_confirm(&uid, &token)
        );

        let mut mail_ctx = Context::new();
        mail_ctx.insert("site_name", &state.settings.site.name);
        mail_ctx.insert("reset_url", &reset_url);
        mail_ctx.insert("email", &account.email);
        let body = state.templates.render("password_reset_email.txt", &mail_ctx)?;

        let subject = format!("Password reset on {}", state.settings.site.name);
        state
            .mailer
            .send(EmailMessage::new(
                subject,
                body,
                state.settings.mail.from_address.clone(),
                vec![account.email.clone()],
            ))
            .await?;
        info!(user_id = %account.id, "password reset mail sent");
    }

    Ok(found(routes::PASSWORD_RESET_DONE))
}

pub async fn password_reset_done(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let ctx = base_context(&state, user.as_ref());
    render(&state, "password_reset_done.html", &ctx)
}

fn render_reset_confirm(
    state: &AppState,
    user: Option<&User>,
    link_valid: bool,
    uidb64: &str,
    token: &str,
    errors: &FormErrors,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(state, user);
    ctx.insert("link_valid", &link_valid);
    ctx.insert("uid", uidb64);
    ctx.insert("token", token);
    ctx.insert("errors", errors);
    render(state, "password_reset_confirm.html", &ctx)
}

pub async fn password_reset_confirm_page(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (uidb64, token) = path.into_inner();
    let user = current_user(&req, &state).await?;

    let link_valid = state
        .auth
        .verify_reset_link(&uidb64, &token)
        .await?
        .is_some();
    render_reset_confirm(
        &state,
        user.as_ref(),
        link_valid,
        &uidb64,
        &token,
        &SetPasswordForm::empty_errors(),
    )
}

pub async fn password_reset_confirm_submit(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    form: web::Form<SetPasswordForm>,
) -> Result<HttpResponse, AppError> {
    let (uidb64, token) = path.into_inner();
    let user = current_user(&req, &state).await?;

    if state
        .auth
        .verify_reset_link(&uidb64, &token)
        .await?
        .is_none()
    {
        return render_reset_confirm(
            &state,
            user.as_ref(),
            false,
            &uidb64,
            &token,
            &SetPasswordForm::empty_errors(),
        );
    }

    let form = form.into_inner();
    let errors = form.validate();
    if has_errors(&errors) {
        return render_reset_confirm(&state, user.as_ref(), true, &uidb64, &token, &errors);
    }

    match state
        .auth
        .complete_password_reset(&uidb64, &token, &form.new_password1)
        .await
    {
        Ok(_) => Ok(found(routes::PASSWORD_RESET_COMPLETE)),
        // The link went stale between the check above and the write.
        Err(AppError::AuthError(AuthError::InvalidResetToken)) => render_reset_confirm(
            &state,
            user.as_ref(),
            false,
            &uidb64,
            &token,
            &SetPasswordForm::empty_errors(),
        ),
        Err(e) => Err(e),
    }
}

pub async fn password_reset_complete(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let ctx = base_context(&state, user.as_ref());
    render(&state, "password_reset_complete.html", &ctx)
}

// ----------------------------------------------------------------- profile

fn render_profile(
    state: &AppState,
    user: &User,
    form: &ProfileForm,
    errors: &FormErrors,
    saved: bool,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(state, Some(user));
    ctx.insert("values", form);
    ctx.insert("errors", errors);
    ctx.insert("saved", &saved);
    ctx.insert("profile_id", &user.id);
    render(state, "profile.html", &ctx)
}

fn profile_target(raw_id: &str) -> Option<Target> {
    Uuid::parse_str(raw_id)
        .ok()
        .map(|id| Target::owned_by(AccountId::new(id)))
}

pub async fn profile_page(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ProfileQuery>,
) -> Result<HttpResponse, AppError> {
    let raw_id = path.into_inner();
    let user = current_user(&req, &state).await?;
    let visitor = visitor_for(user.as_ref());

    let target = profile_target(&raw_id);
    if let Some(response) = enforce(PROFILE_GATE, &visitor, target.as_ref(), req.path())? {
        return Ok(response);
    }
    let account = require_account(user)?;

    let form = ProfileForm {
        email: account.email.clone(),
        name: account.name.clone(),
    };
    let saved = query.into_inner().saved.is_some();
    render_profile(&state, &account, &form, &ProfileForm::empty_errors(), saved)
}

pub async fn profile_submit(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<ProfileForm>,
) -> Result<HttpResponse, AppError> {
    let raw_id = path.into_inner();
    let user = current_user(&req, &state).await?;
    let visitor = visitor_for(user.as_ref());

    let target = profile_target(&raw_id);
    if let Some(response) = enforce(PROFILE_GATE, &visitor, target.as_ref(), req.path())? {
        return Ok(response);
    }
    let account = require_account(user)?;

    let form = form.into_inner();
    let mut errors = form.validate();
    if has_errors(&errors) {
        return render_profile(&state, &account, &form, &errors, false);
    }

    match state.auth.update_profile(&account, &form.email, &form.name).await {
        Ok(updated) => {
            info!(user_id = %updated.id, "profile updated");
            Ok(found(&format!("{}?saved=1", routes::profile(updated.id))))
        }
        Err(AppError::StorageError(StorageError::Duplicate)) => {
            add_error(&mut errors, "email", DUPLICATE_EMAIL);
            render_profile(&state, &account, &form, &errors, false)
        }
        Err(e) => Err(e),
    }
}
