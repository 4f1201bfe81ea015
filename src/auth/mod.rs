//! Accounts and credentials: password hashing, sessions, sign-in
//! throttling and password-reset tokens.

pub mod password;
mod service;
mod throttle;
pub mod tokens;

pub use service::AuthService;
pub use throttle::SigninThrottle;
pub use tokens::ResetTokenGenerator;
