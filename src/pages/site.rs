use actix_web::{web, HttpRequest, HttpResponse};

use crate::error::AppError;
use crate::gate::AccessPolicy;
use crate::pages::{base_context, current_user, enforce, render, routes, visitor_for};
use crate::AppState;

const HOME_GATE: &[AccessPolicy] = &[AccessPolicy::authenticated_only(routes::SIGNIN)];

/// Landing page, open to everyone.
pub async fn top_page(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let ctx = base_context(&state, user.as_ref());
    render(&state, "toppage.html", &ctx)
}

pub async fn home(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req, &state).await?;
    let visitor = visitor_for(user.as_ref());
    if let Some(response) = enforce(HOME_GATE, &visitor, None, req.path())? {
        return Ok(response);
    }

    let ctx = base_context(&state, user.as_ref());
    render(&state, "home.html", &ctx)
}
