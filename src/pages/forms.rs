//! Form payloads and their validation.
//!
//! Every form validates into a [`FormErrors`] map keyed by field name,
//! with `"__all__"` for errors that belong to the form as a whole. The
//! map is seeded with every field so templates can index it without
//! missing-key checks; a field with an empty list simply has no errors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type FormErrors = BTreeMap<String, Vec<String>>;

pub const NON_FIELD: &str = "__all__";

const REQUIRED: &str = "This field is required.";
const INVALID_EMAIL: &str = "Enter a valid email address.";
const PASSWORD_TOO_SHORT: &str =
    "This password is too short. It must contain at least 8 characters.";
const PASSWORD_NUMERIC: &str = "This password is entirely numeric.";
const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";

pub fn add_error(errors: &mut FormErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

pub fn has_errors(errors: &FormErrors) -> bool {
    errors.values().any(|messages| !messages.is_empty())
}

fn seeded(fields: &[&str]) -> FormErrors {
    let mut errors = FormErrors::new();
    errors.insert(NON_FIELD.to_string(), Vec::new());
    for field in fields {
        errors.insert((*field).to_string(), Vec::new());
    }
    errors
}

fn is_valid_email(value: &str) -> bool {
    if value.contains(char::is_whitespace) {
        return false;
    }
    match value.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn check_email(errors: &mut FormErrors, field: &str, value: &str) {
    if value.is_empty() {
        add_error(errors, field, REQUIRED);
    } else if !is_valid_email(value) {
        add_error(errors, field, INVALID_EMAIL);
    }
}

fn check_new_password(errors: &mut FormErrors, first: (&str, &str), second: (&str, &str)) {
    let (first_field, password) = first;
    let (second_field, confirmation) = second;

    if password.is_empty() {
        add_error(errors, first_field, REQUIRED);
    } else {
        if password.len() < 8 {
            add_error(errors, first_field, PASSWORD_TOO_SHORT);
        }
        if password.chars().all(|c| c.is_ascii_digit()) {
            add_error(errors, first_field, PASSWORD_NUMERIC);
        }
    }

    if confirmation.is_empty() {
        add_error(errors, second_field, REQUIRED);
    } else if !password.is_empty() && password != confirmation {
        add_error(errors, second_field, PASSWORD_MISMATCH);
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SigninForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

impl SigninForm {
    pub const FIELDS: &'static [&'static str] = &["username", "password"];

    pub fn empty_errors() -> FormErrors {
        seeded(Self::FIELDS)
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = Self::empty_errors();
        check_email(&mut errors, "username", &self.username);
        if self.password.is_empty() {
            add_error(&mut errors, "password", REQUIRED);
        }
        errors
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SignupForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

impl SignupForm {
    pub const FIELDS: &'static [&'static str] = &["email", "name", "password1", "password2"];

    pub fn empty_errors() -> FormErrors {
        seeded(Self::FIELDS)
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = Self::empty_errors();
        check_email(&mut errors, "email", &self.email);
        if self.name.is_empty() {
            add_error(&mut errors, "name", REQUIRED);
        }
        check_new_password(
            &mut errors,
            ("password1", &self.password1),
            ("password2", &self.password2),
        );
        errors
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChangePasswordForm {
    #[serde(default, skip_serializing)]
    pub old_password: String,
    #[serde(default, skip_serializing)]
    pub new_password1: String,
    #[serde(default, skip_serializing)]
    pub new_password2: String,
}

impl ChangePasswordForm {
    pub const FIELDS: &'static [&'static str] =
        &["old_password", "new_password1", "new_password2"];

    pub fn empty_errors() -> FormErrors {
        seeded(Self::FIELDS)
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = Self::empty_errors();
        if self.old_password.is_empty() {
            add_error(&mut errors, "old_password", REQUIRED);
        }
        check_new_password(
            &mut errors,
            ("new_password1", &self.new_password1),
            ("new_password2", &self.new_password2),
        );
        errors
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub email: String,
}

impl ResetPasswordForm {
    pub const FIELDS: &'static [&'static str] = &["email"];

    pub fn empty_errors() -> FormErrors {
        seeded(Self::FIELDS)
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = Self::empty_errors();
        check_email(&mut errors, "email", &self.email);
        errors
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SetPasswordForm {
    #[serde(default, skip_serializing)]
    pub new_password1: String,
    #[serde(default, skip_serializing)]
    pub new_password2: String,
}

impl SetPasswordForm {
    pub const FIELDS: &'static [&'static str] = &["new_password1", "new_password2"];

    pub fn empty_errors() -> FormErrors {
        seeded(Self::FIELDS)
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = Self::empty_errors();
        check_new_password(
            &mut errors,
            ("new_password1", &self.new_password1),
            ("new_password2", &self.new_password2),
        );
        errors
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl ProfileForm {
    pub const FIELDS: &'static [&'static str] = &["email", "name"];

    pub fn empty_errors() -> FormErrors {
        seeded(Self::FIELDS)
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = Self::empty_errors();
        check_email(&mut errors, "email", &self.email);
        if self.name.is_empty() {
            add_error(&mut errors, "name", REQUIRED);
        }
        errors
    }
}
