use actix_web::{http::header, http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Page not found")]
    NotFound,

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        AppError::TemplateError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StorageError(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

/// Minimal self-contained error page. `ResponseError` has no access to the
/// template registry, and the not-found page in particular must look the
/// same no matter why it was produced.
fn error_page(title: &str, message: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\">\
         <title>{title}</title></head>\n<body>\n<main>\n<h1>{title}</h1>\n\
         <p>{message}</p>\n<p><a href=\"/\">Back to the top page</a></p>\n\
         </main>\n</body>\n</html>\n"
    )
}

fn not_found_body() -> String {
    error_page("Page not found", "The page you requested could not be found.")
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match status {
            StatusCode::NOT_FOUND => not_found_body(),
            StatusCode::TOO_MANY_REQUESTS => error_page(
                "Too many attempts",
                "Too many sign-in attempts. Please wait a minute and try again.",
            ),
            _ => error_page(
                status.canonical_reason().unwrap_or("Error"),
                "Something went wrong while handling your request.",
            ),
        };
        HttpResponse::build(status)
            .insert_header((header::CONTENT_TYPE, "text/html; charset=utf-8"))
            .body(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
                AuthError::NotAuthenticated => StatusCode::UNAUTHORIZED,
                AuthError::Throttled => StatusCode::TOO_MANY_REQUESTS,
                AuthError::InvalidResetToken => StatusCode::BAD_REQUEST,
                AuthError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::StorageError(StorageError::NotFound) => StatusCode::NOT_FOUND,
            AppError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::TemplateError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session expired")]
    SessionExpired,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Too many sign-in attempts")]
    Throttled,

    #[error("Invalid or expired reset link")]
    InvalidResetToken,

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
                StorageError::Duplicate
            }
            _ => StorageError::QueryError(err.to_string()),
        }
    }
}
